//! HDHR Device Operations
//!
//! Builds the user-facing operations on top of the control session and
//! the video receiver:
//!
//! - [`Device`]: one tuner on one device, with tuning, status, lock keys
//!   and streaming
//! - [`ChannelScan`]: walks a channel map looking for signal and programs
//! - [`DeviceSelector`]: picks and locks a free tuner from a pool

pub mod channelscan;
pub mod device;
pub mod selector;

pub use channelscan::{
    wait_for_lock, ChannelScan, ProgramType, ScanError, ScanProgram, ScanResult, ScanTuner,
};
pub use device::{Device, DeviceError};
pub use selector::{DeviceSelector, Selection};
