//! Tuner status text grammar
//!
//! The device reports tuner state as a line of space separated `key=value`
//! tokens, e.g.
//!
//! ```text
//! ch=8vsb:575000000 lock=8vsb ss=83 snq=90 seq=100 bps=19394080 pps=1690
//! ```

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Signal strength at which a signal is considered present
pub const SIGNAL_PRESENT_THRESHOLD: u32 = 45;

/// Display colour for a status metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Neutral,
    Red,
    Yellow,
    Green,
}

/// Parsed tuner status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunerStatus {
    /// Tuned channel, e.g. "auto:575000000" or "none"
    pub channel: String,
    /// Lock state: modulation name, "none", or "(...)" when the modulation is unsupported
    pub lock: String,
    pub signal_present: bool,
    pub lock_supported: bool,
    pub lock_unsupported: bool,
    /// Signal strength (percent)
    pub signal_strength: u32,
    /// Signal to noise quality (percent)
    pub signal_to_noise_quality: u32,
    /// Symbol error quality (percent)
    pub symbol_error_quality: u32,
    pub raw_bits_per_second: u32,
    pub packets_per_second: u32,
}

/// Leading decimal digits of `value`, 0 if there are none
fn parse_leading_u32(value: &str) -> u32 {
    let digits: &str = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(end) => &value[..end],
        None => value,
    };
    digits.parse().unwrap_or(0)
}

impl TunerStatus {
    /// Parse a status line; unknown tokens are ignored and missing ones stay zero
    pub fn parse(status: &str) -> Self {
        let mut result = TunerStatus::default();

        for token in status.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key {
                "ch" => result.channel = value.to_string(),
                "lock" => result.lock = value.to_string(),
                "ss" => result.signal_strength = parse_leading_u32(value),
                "snq" => result.signal_to_noise_quality = parse_leading_u32(value),
                "seq" => result.symbol_error_quality = parse_leading_u32(value),
                "bps" => result.raw_bits_per_second = parse_leading_u32(value),
                "pps" => result.packets_per_second = parse_leading_u32(value),
                _ => {}
            }
        }

        result.signal_present = result.signal_strength >= SIGNAL_PRESENT_THRESHOLD;

        if !result.lock.is_empty() && result.lock != "none" {
            if result.lock.starts_with('(') {
                result.lock_unsupported = true;
            } else {
                result.lock_supported = true;
            }
        }

        result
    }

    /// Colour for the signal strength reading
    pub fn ss_color(&self) -> StatusColor {
        if !self.lock_supported {
            return StatusColor::Neutral;
        }

        let (yellow_min, green_min) = if self.lock.contains("8vsb") {
            (50, 75)
        } else {
            (80, 90)
        };

        if self.signal_strength >= green_min {
            StatusColor::Green
        } else if self.signal_strength >= yellow_min {
            StatusColor::Yellow
        } else {
            StatusColor::Red
        }
    }

    /// Colour for the signal to noise quality reading
    pub fn snq_color(&self) -> StatusColor {
        if self.signal_to_noise_quality >= 70 {
            StatusColor::Green
        } else if self.signal_to_noise_quality >= 50 {
            StatusColor::Yellow
        } else {
            StatusColor::Red
        }
    }

    /// Colour for the symbol error quality reading
    pub fn seq_color(&self) -> StatusColor {
        if self.symbol_error_quality >= 100 {
            StatusColor::Green
        } else {
            StatusColor::Red
        }
    }
}

/// Delivery protocol of a stream target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetProtocol {
    Rtp,
    Udp,
}

impl TargetProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetProtocol::Rtp => "rtp",
            TargetProtocol::Udp => "udp",
        }
    }
}

impl fmt::Display for TargetProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a tuner is sending its stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTarget {
    pub protocol: Option<TargetProtocol>,
    pub addr: SocketAddrV4,
}

impl StreamTarget {
    pub fn new(protocol: TargetProtocol, addr: SocketAddrV4) -> Self {
        StreamTarget {
            protocol: Some(protocol),
            addr,
        }
    }

    /// Parse `[proto://]a.b.c.d:port[ ...]`; `None` for "none" or garbage
    pub fn parse(target: &str) -> Option<Self> {
        let (protocol, rest) = match target.find("//") {
            Some(idx) => {
                let protocol = match target[..idx].trim_end_matches(':') {
                    "rtp" => Some(TargetProtocol::Rtp),
                    "udp" => Some(TargetProtocol::Udp),
                    _ => None,
                };
                (protocol, &target[idx + 2..])
            }
            None => (None, target),
        };

        let addr_text = rest.split(' ').next()?;
        let (ip, port) = addr_text.split_once(':')?;
        let ip: Ipv4Addr = ip.parse().ok()?;
        let port: u16 = port.parse().ok()?;

        Some(StreamTarget {
            protocol,
            addr: SocketAddrV4::new(ip, port),
        })
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Some(protocol) => write!(f, "{}://{}", protocol, self.addr),
            None => write!(f, "{}", self.addr),
        }
    }
}
