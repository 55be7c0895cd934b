//! Framed TLV packet codec
//!
//! Discovery and control messages share one frame layout:
//!
//! ```text
//! +---------+---------+-------------------+-----------+
//! |  type   | length  |      payload      |   CRC32   |
//! | u16 BE  | u16 BE  |  length bytes     |  u32 LE   |
//! +---------+---------+-------------------+-----------+
//! ```
//!
//! The payload is a sequence of TLV entries: a one byte tag, a one or two
//! byte length (high bit of the first byte marks a second byte) and the
//! value. The CRC is the reflected Ethernet CRC-32 over type, length and
//! payload.
//!
//! A [`FrameBuf`] is a fixed buffer with four cursors (`start`, `pos`,
//! `end`, `limit`). It keeps headroom in front of the payload window so the
//! type/length prefix can be written in place when the frame is sealed,
//! and it is meant to be reused across messages with [`FrameBuf::reset`].

use crate::types::MAX_PAYLOAD_SIZE;
use crc::{Crc, CRC_32_ISO_HDLC};
use thiserror::Error;

/// CRC-32 used for the frame trailer (poly 0xEDB88320 reflected, init/xorout 0xFFFFFFFF)
pub const FRAME_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Bytes reserved in front of the payload window
pub const FRAME_HEADROOM: usize = 1024;

/// Size of the type + length prefix
pub const FRAME_HEADER_SIZE: usize = 4;

/// Size of the CRC trailer
pub const FRAME_CRC_SIZE: usize = 4;

/// Total backing storage
const BUFFER_SIZE: usize = 3074;

/// Largest value the two byte length encoding can carry
pub const MAX_VAR_LENGTH: usize = 0x7FFF;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Length {0} cannot be encoded (max {MAX_VAR_LENGTH})")]
    LengthTooLarge(usize),

    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },
}

/// Result of trying to open a received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// A whole frame with a valid CRC; carries the frame type
    Complete(u16),
    /// Not enough bytes yet; keep receiving
    Incomplete,
    /// CRC mismatch; the frame must be discarded
    Corrupt,
}

/// A TLV entry located in a frame
///
/// After [`FrameBuf::read_tlv`] the buffer position sits on the first
/// value byte; `next` is the position of the following entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u8,
    pub len: usize,
    pub next: usize,
}

/// Reusable frame buffer
pub struct FrameBuf {
    buffer: Box<[u8; BUFFER_SIZE]>,
    start: usize,
    pos: usize,
    end: usize,
    limit: usize,
}

impl Default for FrameBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuf {
    /// Create an empty frame buffer
    pub fn new() -> Self {
        let mut frame = FrameBuf {
            buffer: Box::new([0u8; BUFFER_SIZE]),
            start: 0,
            pos: 0,
            end: 0,
            limit: BUFFER_SIZE - FRAME_CRC_SIZE,
        };
        frame.reset();
        frame
    }

    /// Discard contents and move all cursors to the start of the payload window
    pub fn reset(&mut self) {
        self.start = FRAME_HEADROOM;
        self.pos = FRAME_HEADROOM;
        self.end = FRAME_HEADROOM;
        self.limit = BUFFER_SIZE - FRAME_CRC_SIZE;
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Move the read position (clamped to the window)
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.clamp(self.start, self.end);
    }

    /// Bytes between `start` and `end`
    ///
    /// Before sealing this is the payload, after sealing the whole frame
    /// ready to send, after opening the payload again.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[self.start..self.end]
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Payload bytes written so far
    pub fn payload_len(&self) -> usize {
        self.end - self.start
    }

    fn ensure_room(&self, len: usize) -> Result<(), FrameError> {
        let size = self.pos + len - self.start;
        if size > MAX_PAYLOAD_SIZE || self.pos + len > self.limit {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }

    fn advance_write(&mut self, len: usize) {
        self.pos += len;
        if self.pos > self.end {
            self.end = self.pos;
        }
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), FrameError> {
        self.ensure_room(1)?;
        self.buffer[self.pos] = value;
        self.advance_write(1);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), FrameError> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), FrameError> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write a TLV length: one byte up to 127, otherwise two bytes
    pub fn write_var_length(&mut self, value: usize) -> Result<(), FrameError> {
        if value > MAX_VAR_LENGTH {
            return Err(FrameError::LengthTooLarge(value));
        }
        if value <= 127 {
            self.write_u8(value as u8)
        } else {
            self.ensure_room(2)?;
            self.write_u8((value as u8) | 0x80)?;
            self.write_u8((value >> 7) as u8)
        }
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), FrameError> {
        self.ensure_room(data.len())?;
        self.buffer[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.advance_write(data.len());
        Ok(())
    }

    /// Write a complete TLV entry
    pub fn write_tlv(&mut self, tag: u8, value: &[u8]) -> Result<(), FrameError> {
        let length_size = if value.len() <= 127 { 1 } else { 2 };
        self.ensure_room(1 + length_size + value.len())?;
        self.write_u8(tag)?;
        self.write_var_length(value.len())?;
        self.write_bytes(value)
    }

    /// Write a TLV entry whose value is a NUL-terminated string
    pub fn write_tlv_str(&mut self, tag: u8, value: &str) -> Result<(), FrameError> {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.write_tlv(tag, &bytes)
    }

    /// Prefix the payload with type and length and append the CRC
    ///
    /// Afterwards [`FrameBuf::as_slice`] is the frame to transmit.
    pub fn seal_frame(&mut self, frame_type: u16) {
        let length = self.end - self.start;

        self.start -= FRAME_HEADER_SIZE;
        self.buffer[self.start..self.start + 2].copy_from_slice(&frame_type.to_be_bytes());
        self.buffer[self.start + 2..self.start + 4].copy_from_slice(&(length as u16).to_be_bytes());

        let crc = FRAME_CRC.checksum(&self.buffer[self.start..self.end]);
        self.buffer[self.end..self.end + FRAME_CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
        self.end += FRAME_CRC_SIZE;
        self.pos = self.start;
    }

    /// Try to open the frame held in the buffer
    ///
    /// On success the window is narrowed to the payload and the position is
    /// rewound to its first byte.
    pub fn open_frame(&mut self) -> FrameStatus {
        self.pos = self.start;

        if self.start + FRAME_HEADER_SIZE > self.end {
            return FrameStatus::Incomplete;
        }

        let frame_type = u16::from_be_bytes([self.buffer[self.start], self.buffer[self.start + 1]]);
        let length =
            u16::from_be_bytes([self.buffer[self.start + 2], self.buffer[self.start + 3]]) as usize;

        let crc_pos = self.start + FRAME_HEADER_SIZE + length;
        if crc_pos + FRAME_CRC_SIZE > self.end {
            return FrameStatus::Incomplete;
        }

        let calc_crc = FRAME_CRC.checksum(&self.buffer[self.start..crc_pos]);
        let mut trailer = [0u8; FRAME_CRC_SIZE];
        trailer.copy_from_slice(&self.buffer[crc_pos..crc_pos + FRAME_CRC_SIZE]);
        if calc_crc != u32::from_le_bytes(trailer) {
            return FrameStatus::Corrupt;
        }

        self.start += FRAME_HEADER_SIZE;
        self.end = self.start + length;
        self.pos = self.start;
        FrameStatus::Complete(frame_type)
    }

    /// Free space after `end` for receiving more bytes
    pub fn recv_space(&mut self) -> &mut [u8] {
        &mut self.buffer[self.end..self.limit]
    }

    /// Account for `n` bytes received into [`FrameBuf::recv_space`]
    pub fn commit_received(&mut self, n: usize) {
        self.end = (self.end + n).min(self.limit);
    }

    /// Replace contents with a received datagram
    pub fn load(&mut self, data: &[u8]) -> Result<(), FrameError> {
        self.reset();
        let space = self.limit - self.end;
        if data.len() > space {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max: space,
            });
        }
        self.recv_space()[..data.len()].copy_from_slice(data);
        self.commit_received(data.len());
        Ok(())
    }

    fn need(&self, len: usize) -> Result<(), FrameError> {
        if self.pos + len > self.end {
            return Err(FrameError::InsufficientData {
                expected: len,
                actual: self.end - self.pos,
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, FrameError> {
        self.need(1)?;
        let value = self.buffer[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, FrameError> {
        self.need(2)?;
        let value = u16::from_be_bytes([self.buffer[self.pos], self.buffer[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32, FrameError> {
        self.need(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buffer[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_be_bytes(raw))
    }

    /// Read a TLV length; `None` if the frame ends mid-length
    pub fn read_var_length(&mut self) -> Option<usize> {
        let first = self.read_u8().ok()? as usize;
        if first & 0x80 == 0 {
            return Some(first);
        }
        let second = self.read_u8().ok()? as usize;
        Some((first & 0x7F) | (second << 7))
    }

    /// Locate the next TLV entry
    ///
    /// Returns `None` at the end of the payload or when the entry does not
    /// fit in the remaining bytes.
    pub fn read_tlv(&mut self) -> Option<Tlv> {
        if self.pos + 2 > self.end {
            return None;
        }
        let tag = self.read_u8().ok()?;
        let len = self.read_var_length()?;
        if self.pos + len > self.end {
            return None;
        }
        Some(Tlv {
            tag,
            len,
            next: self.pos + len,
        })
    }

    /// Read the next TLV entry and step past it
    pub fn next_tlv(&mut self) -> Option<(u8, &[u8])> {
        let tlv = self.read_tlv()?;
        let value_start = self.pos;
        self.pos = tlv.next;
        Some((tlv.tag, &self.buffer[value_start..tlv.next]))
    }
}

/// Interpret a TLV value as a NUL-terminated string
pub fn tlv_str(value: &[u8]) -> String {
    let text = match value.iter().position(|&b| b == 0) {
        Some(nul) => &value[..nul],
        None => value,
    };
    String::from_utf8_lossy(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed(frame_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = FrameBuf::new();
        frame.write_bytes(payload).unwrap();
        frame.seal_frame(frame_type);
        frame.as_slice().to_vec()
    }

    #[test]
    fn test_seal_layout() {
        let bytes = sealed(0x0004, &[0xAA, 0xBB]);
        assert_eq!(bytes.len(), 4 + 2 + 4);
        assert_eq!(&bytes[..4], &[0x00, 0x04, 0x00, 0x02]);
        assert_eq!(&bytes[4..6], &[0xAA, 0xBB]);

        let crc = FRAME_CRC.checksum(&bytes[..6]);
        assert_eq!(&bytes[6..], &crc.to_le_bytes());
    }

    #[test]
    fn test_crc_check_value() {
        // Standard CRC-32 check value
        assert_eq!(FRAME_CRC.checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_open_roundtrip() {
        let bytes = sealed(0x0005, b"payload");
        let mut frame = FrameBuf::new();
        frame.load(&bytes).unwrap();

        assert_eq!(frame.open_frame(), FrameStatus::Complete(0x0005));
        assert_eq!(frame.as_slice(), b"payload");
        assert_eq!(frame.pos(), frame.start());
    }

    #[test]
    fn test_open_incomplete() {
        let bytes = sealed(0x0005, b"payload");
        let mut frame = FrameBuf::new();

        frame.load(&bytes[..3]).unwrap();
        assert_eq!(frame.open_frame(), FrameStatus::Incomplete);

        frame.load(&bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(frame.open_frame(), FrameStatus::Incomplete);
    }

    #[test]
    fn test_open_partial_then_complete() {
        let bytes = sealed(0x0003, b"split delivery");
        let mut frame = FrameBuf::new();

        let (first, second) = bytes.split_at(5);
        frame.recv_space()[..first.len()].copy_from_slice(first);
        frame.commit_received(first.len());
        assert_eq!(frame.open_frame(), FrameStatus::Incomplete);

        frame.recv_space()[..second.len()].copy_from_slice(second);
        frame.commit_received(second.len());
        assert_eq!(frame.open_frame(), FrameStatus::Complete(0x0003));
        assert_eq!(frame.as_slice(), b"split delivery");
    }

    #[test]
    fn test_open_corrupt() {
        let mut bytes = sealed(0x0005, b"payload");
        bytes[6] ^= 0x01;
        let mut frame = FrameBuf::new();
        frame.load(&bytes).unwrap();
        assert_eq!(frame.open_frame(), FrameStatus::Corrupt);
    }

    #[test]
    fn test_var_length_encoding() {
        let mut frame = FrameBuf::new();
        frame.write_var_length(127).unwrap();
        assert_eq!(frame.as_slice(), &[0x7F]);

        frame.reset();
        frame.write_var_length(128).unwrap();
        assert_eq!(frame.as_slice(), &[0x80, 0x01]);

        frame.reset();
        frame.write_var_length(300).unwrap();
        frame.set_pos(frame.start());
        assert_eq!(frame.read_var_length(), Some(300));

        assert!(frame.write_var_length(MAX_VAR_LENGTH + 1).is_err());
    }

    #[test]
    fn test_tlv_walk() {
        let mut frame = FrameBuf::new();
        frame.write_tlv(0x01, &1u32.to_be_bytes()).unwrap();
        frame.write_tlv_str(0x03, "/sys/model").unwrap();
        frame.seal_frame(0x0004);

        let bytes = frame.as_slice().to_vec();
        let mut rx = FrameBuf::new();
        rx.load(&bytes).unwrap();
        assert_eq!(rx.open_frame(), FrameStatus::Complete(0x0004));

        let (tag, value) = rx.next_tlv().unwrap();
        assert_eq!(tag, 0x01);
        assert_eq!(value, &[0, 0, 0, 1]);

        let (tag, value) = rx.next_tlv().unwrap();
        assert_eq!(tag, 0x03);
        assert_eq!(tlv_str(value), "/sys/model");

        assert!(rx.next_tlv().is_none());
    }

    #[test]
    fn test_truncated_tlv() {
        let mut frame = FrameBuf::new();
        frame.write_u8(0x04).unwrap();
        frame.write_var_length(10).unwrap();
        frame.write_bytes(b"abc").unwrap();
        frame.set_pos(frame.start());
        assert!(frame.read_tlv().is_none());
    }

    #[test]
    fn test_payload_limit() {
        let mut frame = FrameBuf::new();
        let big = vec![0u8; MAX_PAYLOAD_SIZE];
        frame.write_bytes(&big).unwrap();
        assert!(matches!(
            frame.write_u8(0),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_reuse_after_reset() {
        let mut frame = FrameBuf::new();
        frame.write_u32(0xDEAD_BEEF).unwrap();
        frame.seal_frame(0x0002);
        frame.reset();

        frame.write_u16(0x1234).unwrap();
        assert_eq!(frame.as_slice(), &[0x12, 0x34]);
        assert!(frame.start() <= frame.pos() && frame.pos() <= frame.end());
        assert!(frame.end() <= frame.limit());
    }
}
