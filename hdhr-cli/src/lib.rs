//! HDHR CLI Library
//!
//! Shared functionality for the tuner command-line tools.

pub mod config;
pub mod stats;

pub use config::{Config, ConfigError, DeviceConfig, ScanConfig, VideoSection};
pub use stats::{
    format_bitrate, format_elapsed, format_packet_rates, format_scan_result, format_stream_volume,
    format_tuner_status, format_video_progress,
};
