//! HDHR - network tuner client
//!
//! High-level Rust API for discovering, controlling and streaming from
//! network TV tuner appliances.

pub use hdhr_control as control;
pub use hdhr_device as device;
pub use hdhr_io as io;
pub use hdhr_protocol as protocol;
pub use hdhr_stream as stream;

// Re-export commonly used types
pub use control::{find_devices, ControlSession, DiscoveredDevice, Outcome};
pub use device::{ChannelScan, Device, DeviceSelector, ScanResult, Selection};
pub use io::Logger;
pub use protocol::{ChannelList, StreamTarget, TunerStatus};
pub use stream::{VideoConfig, VideoStats};
