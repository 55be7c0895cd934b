//! Statistics display and formatting

use hdhr_device::ScanResult;
use hdhr_protocol::types::TS_PACKET_SIZE;
use hdhr_protocol::TunerStatus;
use hdhr_stream::VideoStats;
use std::fmt::Write;
use std::time::Duration;

/// Saved stream volume as transport packets plus decimal megabytes
pub fn format_stream_volume(bytes: u64) -> String {
    format!(
        "{} ts ({:.1} MB)",
        bytes / TS_PACKET_SIZE as u64,
        bytes as f64 / 1_000_000.0
    )
}

/// Format a bit rate in human-readable form
pub fn format_bitrate(bps: u64) -> String {
    const KBPS: u64 = 1000;
    const MBPS: u64 = KBPS * 1000;

    if bps >= MBPS {
        format!("{:.3} Mbps", bps as f64 / MBPS as f64)
    } else if bps >= KBPS {
        format!("{:.2} Kbps", bps as f64 / KBPS as f64)
    } else {
        format!("{} bps", bps)
    }
}

/// Elapsed time as `HH:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Received batches and stream errors per second
pub fn format_packet_rates(stats: &VideoStats, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "0.0 pkt/s, 0.00 err/s".to_string();
    }

    let errors = stats.network_error_count as u64
        + stats.transport_error_count as u64
        + stats.sequence_error_count as u64
        + stats.overflow_error_count as u64;
    format!(
        "{:.1} pkt/s, {:.2} err/s",
        stats.packet_count as f64 / secs,
        errors as f64 / secs
    )
}

/// One-line tuner status summary
pub fn format_tuner_status(status: &TunerStatus) -> String {
    format!(
        "ch={} lock={} ss={}% snq={}% seq={}% bps={} pps={}",
        status.channel,
        status.lock,
        status.signal_strength,
        status.signal_to_noise_quality,
        status.symbol_error_quality,
        format_bitrate(status.raw_bits_per_second as u64),
        status.packets_per_second
    )
}

/// Periodic line for a running stream
pub fn format_video_progress(bytes: u64, elapsed: Duration, stats: &VideoStats) -> String {
    let secs = elapsed.as_secs_f64();
    let bps = if secs > 0.0 {
        (bytes as f64 * 8.0 / secs) as u64
    } else {
        0
    };

    format!(
        "[{}] {} {} {} (net {} ts {} seq {} ovf {})",
        format_elapsed(elapsed),
        format_stream_volume(bytes),
        format_bitrate(bps),
        format_packet_rates(stats, elapsed),
        stats.network_error_count,
        stats.transport_error_count,
        stats.sequence_error_count,
        stats.overflow_error_count
    )
}

/// Multi-line report for one scanned frequency
pub fn format_scan_result(result: &ScanResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "SCANNING: {} ({})", result.frequency, result.channel_str);
    let _ = writeln!(
        out,
        "LOCK: {} (ss={} snq={} seq={})",
        result.status.lock,
        result.status.signal_strength,
        result.status.signal_to_noise_quality,
        result.status.symbol_error_quality
    );

    if let Some(tsid) = result.transport_stream_id {
        let _ = writeln!(out, "TSID: 0x{:04X}", tsid);
    }

    for program in &result.programs {
        let _ = writeln!(out, "PROGRAM {}", program.program_str);
    }

    out
}
