//! Wire constants shared by the discovery, control and video protocols

/// UDP port devices listen on for discovery requests
pub const DISCOVER_UDP_PORT: u16 = 65001;

/// TCP port devices accept control connections on
pub const CONTROL_TCP_PORT: u16 = 65001;

/// Largest frame the device will send or accept (type + length + payload + CRC)
pub const MAX_PACKET_SIZE: usize = 1460;

/// Largest payload carried in one frame
pub const MAX_PAYLOAD_SIZE: usize = 1452;

/// Device type code of a tuner appliance
pub const DEVICE_TYPE_TUNER: u32 = 0x0000_0001;

/// Matches any device type in discovery
pub const DEVICE_TYPE_WILDCARD: u32 = 0xFFFF_FFFF;

/// Matches any device id in discovery
pub const DEVICE_ID_WILDCARD: u32 = 0xFFFF_FFFF;

/// MPEG transport stream packet size
pub const TS_PACKET_SIZE: usize = 188;

/// Transport packets carried in one video datagram
pub const TS_PACKETS_PER_BATCH: usize = 7;

/// Video datagram payload size (7 transport packets)
pub const VIDEO_DATA_PACKET_SIZE: usize = TS_PACKET_SIZE * TS_PACKETS_PER_BATCH;

/// Video datagram size when wrapped in RTP
pub const VIDEO_RTP_DATA_PACKET_SIZE: usize = VIDEO_DATA_PACKET_SIZE + crate::rtp::RTP_HEADER_SIZE;

/// Nominal stream bitrate used to size a one second buffer
pub const VIDEO_BITRATE: usize = 20_000_000;

/// Bytes needed to hold about one second of stream
pub const VIDEO_DATA_BUFFER_SIZE_1S: usize = VIDEO_BITRATE / 8;

/// Frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FrameType {
    /// Discovery request (client → device)
    DiscoverReq = 0x0002,
    /// Discovery reply (device → client)
    DiscoverRpy = 0x0003,
    /// Get/set request (client → device)
    GetSetReq = 0x0004,
    /// Get/set reply (device → client)
    GetSetRpy = 0x0005,
}

impl FrameType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0002 => Some(FrameType::DiscoverReq),
            0x0003 => Some(FrameType::DiscoverRpy),
            0x0004 => Some(FrameType::GetSetReq),
            0x0005 => Some(FrameType::GetSetRpy),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Frame type the device answers a request with
    pub fn reply_type(self) -> u16 {
        self.as_u16() + 1
    }
}

/// TLV tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    /// Device type (u32)
    DeviceType = 0x01,
    /// Device id (u32)
    DeviceId = 0x02,
    /// Variable name (NUL-terminated)
    GetSetName = 0x03,
    /// Variable value (NUL-terminated)
    GetSetValue = 0x04,
    /// Error text returned instead of a value (NUL-terminated)
    ErrorMessage = 0x05,
    /// Number of tuners (u8)
    TunerCount = 0x10,
    /// Lock key guarding a set (u32)
    GetSetLockKey = 0x15,
}

impl Tag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Tag::DeviceType),
            0x02 => Some(Tag::DeviceId),
            0x03 => Some(Tag::GetSetName),
            0x04 => Some(Tag::GetSetValue),
            0x05 => Some(Tag::ErrorMessage),
            0x10 => Some(Tag::TunerCount),
            0x15 => Some(Tag::GetSetLockKey),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
