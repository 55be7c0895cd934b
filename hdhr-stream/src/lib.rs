//! HDHR Video Stream Reception
//!
//! Receives the MPEG transport stream a tuner sends over UDP (optionally
//! wrapped in RTP) into a ring buffer on a background thread, validating
//! continuity as it goes. Consumers drain the buffer in whole 1316-byte
//! batches.

pub mod continuity;
pub mod ring;
pub mod video;

pub use continuity::{ContinuityTable, TsCheck};
pub use ring::{RingBuffer, VideoStats};
pub use video::{VideoConfig, VideoError, VideoSocket};
