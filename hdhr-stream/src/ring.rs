//! Video ring buffer
//!
//! Fixed-capacity byte ring holding whole 1316-byte batches (seven TS
//! packets). The receive thread pushes at `head`; the consumer reads from
//! `tail`. A read is only released on the *next* read, so the region handed
//! out last time stays reserved until then.
//!
//! One slot is always left empty: a push that would make `head == tail`
//! is dropped and counted as an overflow.

use crate::continuity::{ContinuityTable, TsCheck};
use bytes::Bytes;
use hdhr_protocol::rtp::RtpSequence;
use hdhr_protocol::types::{TS_PACKET_SIZE, VIDEO_DATA_PACKET_SIZE};
use std::fmt;

/// Stream health counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStats {
    /// Batches received
    pub packet_count: u32,
    /// RTP sequence gaps
    pub network_error_count: u32,
    /// TS packets with the transport error indicator set
    pub transport_error_count: u32,
    /// TS continuity counter jumps
    pub sequence_error_count: u32,
    /// Batches dropped because the buffer was full
    pub overflow_error_count: u32,
}

impl fmt::Display for VideoStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pkt={} net={} te={} miss={} drop={}",
            self.packet_count,
            self.network_error_count,
            self.transport_error_count,
            self.sequence_error_count,
            self.overflow_error_count
        )
    }
}

/// Ring buffer of TS batches with integrity accounting
pub struct RingBuffer {
    buffer: Box<[u8]>,
    head: usize,
    tail: usize,
    /// Bytes handed out by the last `recv`, released on the next one
    advance: usize,
    stats: VideoStats,
    continuity: ContinuityTable,
    rtp: RtpSequence,
}

impl RingBuffer {
    /// Create a buffer holding at least `size` bytes
    ///
    /// Capacity is rounded down to whole batches, plus one spare batch.
    pub fn new(size: usize) -> Self {
        let capacity = (size / VIDEO_DATA_PACKET_SIZE) * VIDEO_DATA_PACKET_SIZE
            + VIDEO_DATA_PACKET_SIZE;

        RingBuffer {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            advance: 0,
            stats: VideoStats::default(),
            continuity: ContinuityTable::new(),
            rtp: RtpSequence::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Bytes between tail and head, including any region not yet released
    pub fn buffered(&self) -> usize {
        if self.head >= self.tail {
            self.head - self.tail
        } else {
            self.capacity() - self.tail + self.head
        }
    }

    /// Record the RTP sequence number of the next batch
    ///
    /// A gap counts as a network error and invalidates every PID's
    /// continuity state.
    pub fn observe_rtp(&mut self, sequence: u16) {
        if !self.rtp.observe(sequence) {
            self.stats.network_error_count = self.stats.network_error_count.wrapping_add(1);
            self.continuity.reset();
        }
    }

    /// Append one batch
    ///
    /// Returns false if `batch` is not exactly one batch long (discarded)
    /// or the buffer was full (counted as overflow).
    pub fn push_batch(&mut self, batch: &[u8]) -> bool {
        if batch.len() != VIDEO_DATA_PACKET_SIZE {
            return false;
        }

        let head = self.head;
        self.buffer[head..head + VIDEO_DATA_PACKET_SIZE].copy_from_slice(batch);
        self.stats.packet_count = self.stats.packet_count.wrapping_add(1);

        for packet in batch.chunks_exact(TS_PACKET_SIZE) {
            match self.continuity.check_packet(packet) {
                TsCheck::TransportError => {
                    self.stats.transport_error_count = self.stats.transport_error_count.wrapping_add(1)
                }
                TsCheck::SequenceError => {
                    self.stats.sequence_error_count = self.stats.sequence_error_count.wrapping_add(1)
                }
                TsCheck::Ok | TsCheck::Ignored => {}
            }
        }

        let mut next = head + VIDEO_DATA_PACKET_SIZE;
        if next >= self.capacity() {
            next -= self.capacity();
        }

        if next == self.tail {
            self.stats.overflow_error_count = self.stats.overflow_error_count.wrapping_add(1);
            return false;
        }

        self.head = next;
        true
    }

    /// Take up to `max_size` bytes (rounded down to whole batches)
    ///
    /// Releases the region returned by the previous call first. Returns
    /// an empty buffer when nothing is available. A read never wraps, so
    /// a full drain may take two calls.
    pub fn recv(&mut self, max_size: usize) -> Bytes {
        let mut tail = self.tail + self.advance;
        if tail >= self.capacity() {
            tail -= self.capacity();
        }
        self.tail = tail;
        self.advance = 0;

        if self.head == tail {
            return Bytes::new();
        }

        let size = (max_size / VIDEO_DATA_PACKET_SIZE) * VIDEO_DATA_PACKET_SIZE;
        if size == 0 {
            return Bytes::new();
        }

        let avail = if self.head > tail {
            self.head - tail
        } else {
            self.capacity() - tail
        };
        let size = size.min(avail);

        self.advance = size;
        Bytes::copy_from_slice(&self.buffer[tail..tail + size])
    }

    /// Drop everything buffered and zero all counters
    pub fn flush(&mut self) {
        self.tail = self.head;
        self.advance = 0;
        self.continuity.reset();
        self.rtp.reset();
        self.stats = VideoStats::default();
    }

    pub fn stats(&self) -> VideoStats {
        self.stats
    }
}
