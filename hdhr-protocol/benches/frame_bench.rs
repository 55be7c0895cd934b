use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hdhr_protocol::frame::{FrameBuf, FrameStatus};
use hdhr_protocol::types::{FrameType, Tag};
use hdhr_protocol::validate_device_id;

fn bench_getset_seal(c: &mut Criterion) {
    let mut frame = FrameBuf::new();

    c.bench_function("getset_seal", |b| {
        b.iter(|| {
            frame.reset();
            frame
                .write_tlv_str(Tag::GetSetName.as_u8(), black_box("/tuner0/channel"))
                .unwrap();
            frame
                .write_tlv_str(Tag::GetSetValue.as_u8(), black_box("auto:575000000"))
                .unwrap();
            frame.seal_frame(FrameType::GetSetReq.as_u16());
            black_box(frame.as_slice().len());
        });
    });
}

fn bench_open_frame(c: &mut Criterion) {
    let mut tx = FrameBuf::new();
    tx.write_bytes(&[0x5A; 1024]).unwrap();
    tx.seal_frame(FrameType::GetSetRpy.as_u16());
    let bytes = tx.as_slice().to_vec();

    let mut group = c.benchmark_group("open_frame");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("1k_payload", |b| {
        let mut rx = FrameBuf::new();
        b.iter(|| {
            rx.load(black_box(&bytes)).unwrap();
            assert_eq!(rx.open_frame(), FrameStatus::Complete(0x0005));
        });
    });
    group.finish();
}

fn bench_device_id(c: &mut Criterion) {
    c.bench_function("validate_device_id", |b| {
        b.iter(|| black_box(validate_device_id(black_box(0x1010_0000))));
    });
}

criterion_group!(benches, bench_getset_seal, bench_open_frame, bench_device_id);
criterion_main!(benches);
