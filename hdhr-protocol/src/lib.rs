//! HDHR Protocol Core Implementation
//!
//! This crate implements the wire-level pieces shared by the discovery and
//! control protocols of network tuner appliances: the framed TLV packet
//! codec, device identifier validation, channel map tables, tuner status
//! text grammar and RTP header handling for the video stream.

pub mod channels;
pub mod device_id;
pub mod frame;
pub mod rtp;
pub mod status;
pub mod types;

pub use channels::{ChannelEntry, ChannelError, ChannelList, ChannelMapRecord};
pub use device_id::{default_tuner_count, validate_device_id};
pub use frame::{FrameBuf, FrameError, FrameStatus, Tlv};
pub use rtp::{RtpHeader, RtpSequence};
pub use status::{StatusColor, StreamTarget, TargetProtocol, TunerStatus};
pub use types::{FrameType, Tag};
