//! RTP header handling for the video stream
//!
//! When the stream target uses the `rtp://` scheme each datagram starts
//! with a fixed 12-byte RTP header. Only the 16-bit sequence number
//! matters here: a gap means datagrams were lost on the network.

use crate::frame::FrameError;
use bytes::Buf;
use std::fmt;

/// Size of the RTP header (no CSRC list, no extension)
pub const RTP_HEADER_SIZE: usize = 12;

/// Fixed RTP header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Version, padding, extension and CSRC count
    pub flags: u8,
    /// Marker bit and payload type
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// Parse the header from the front of a datagram (network byte order)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < RTP_HEADER_SIZE {
            return Err(FrameError::InsufficientData {
                expected: RTP_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..RTP_HEADER_SIZE];
        Ok(RtpHeader {
            flags: buf.get_u8(),
            payload_type: buf.get_u8(),
            sequence: buf.get_u16(),
            timestamp: buf.get_u32(),
            ssrc: buf.get_u32(),
        })
    }
}

/// Tracks RTP sequence continuity
///
/// Sequence numbers wrap at 16 bits. The first datagram after a reset is
/// always accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtpSequence {
    previous: Option<u16>,
}

impl RtpSequence {
    pub fn new() -> Self {
        RtpSequence { previous: None }
    }

    /// Forget the previous sequence number
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Last sequence number seen
    pub fn previous(&self) -> Option<u16> {
        self.previous
    }

    /// Record `sequence`; returns false if datagrams were skipped
    pub fn observe(&mut self, sequence: u16) -> bool {
        let previous = self.previous.replace(sequence);
        match previous {
            None => true,
            Some(prev) => sequence == prev.wrapping_add(1),
        }
    }
}

impl fmt::Display for RtpSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.previous {
            Some(seq) => write!(f, "{}", seq),
            None => write!(f, "-"),
        }
    }
}
