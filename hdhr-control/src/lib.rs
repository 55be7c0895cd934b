//! HDHR Discovery and Control
//!
//! Two request/response protocols share the framed TLV codec:
//!
//! - **Discovery**: UDP broadcast (or unicast) on port 65001; devices
//!   answer with their type, id and tuner count.
//! - **Control**: a TCP session to port 65001 carrying get/set requests
//!   for named variables, optionally guarded by a tuner lock key.
//!
//! Control calls report a three-way [`Outcome`]: the device answered with
//! a value, the device refused, or the exchange itself failed.

pub mod control;
pub mod discover;
pub mod outcome;

pub use control::{ControlConfig, ControlError, ControlSession};
pub use discover::{
    find_devices, is_ip_multicast, DiscoverConfig, DiscoverError, DiscoveredDevice, Discover,
};
pub use outcome::Outcome;
