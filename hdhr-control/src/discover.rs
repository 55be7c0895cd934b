//! Device discovery
//!
//! A discovery request names a device type and id (either may be a
//! wildcard) and is broadcast on every local subnet, or sent to one
//! address. Matching devices reply with a `DISCOVER_RPY` frame.
//!
//! One socket is kept per local interface so a broadcast leaves through
//! each of them; the set is refreshed on every search as interfaces come
//! and go.

use hdhr_io::{local_ipv4_interfaces, LocalInterface, Logger, SocketError, UdpSock};
use hdhr_protocol::default_tuner_count;
use hdhr_protocol::frame::{FrameBuf, FrameError, FrameStatus};
use hdhr_protocol::types::{FrameType, Tag, DISCOVER_UDP_PORT};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Discovery errors
#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Discovery to multicast address {0} is not supported")]
    MulticastTarget(Ipv4Addr),
}

/// True for 224.0.0.0 - 239.255.255.255
pub fn is_ip_multicast(ip: Ipv4Addr) -> bool {
    ip.is_multicast()
}

/// A device that answered a discovery request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscoveredDevice {
    pub ip_addr: Ipv4Addr,
    pub device_type: u32,
    pub device_id: u32,
    pub tuner_count: u8,
}

/// Discovery timing
#[derive(Debug, Clone)]
pub struct DiscoverConfig {
    /// Destination port of requests
    pub port: u16,
    /// Send/listen rounds per search
    pub rounds: usize,
    /// Listening time per round
    pub round_timeout: Duration,
    /// Per-socket poll interval while listening
    pub poll_interval: Duration,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        DiscoverConfig {
            port: DISCOVER_UDP_PORT,
            rounds: 2,
            round_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
        }
    }
}

struct DiscoverSock {
    sock: UdpSock,
    /// `None` for the routable socket bound to 0.0.0.0
    iface: Option<LocalInterface>,
    detected: bool,
}

/// Discovery state: sockets plus reusable frame buffers
pub struct Discover {
    socks: Vec<DiscoverSock>,
    tx: FrameBuf,
    rx: FrameBuf,
    config: DiscoverConfig,
    logger: Logger,
}

impl Discover {
    pub fn new(logger: Logger) -> Result<Self, DiscoverError> {
        Self::with_config(DiscoverConfig::default(), logger)
    }

    pub fn with_config(config: DiscoverConfig, logger: Logger) -> Result<Self, DiscoverError> {
        let routable = Self::open_sock(Ipv4Addr::UNSPECIFIED, config.poll_interval)?;

        Ok(Discover {
            socks: vec![DiscoverSock {
                sock: routable,
                iface: None,
                detected: true,
            }],
            tx: FrameBuf::new(),
            rx: FrameBuf::new(),
            config,
            logger: logger.with_prefix("discover"),
        })
    }

    fn open_sock(ip: Ipv4Addr, poll_interval: Duration) -> Result<UdpSock, SocketError> {
        let sock = UdpSock::bind(SocketAddrV4::new(ip, 0), false)?;
        sock.set_broadcast(true)?;
        sock.set_recv_timeout(poll_interval)?;
        Ok(sock)
    }

    /// Number of sockets currently open (routable socket included)
    pub fn sock_count(&self) -> usize {
        self.socks.len()
    }

    /// Sync the per-interface sockets with the current interface list
    fn refresh_interfaces(&mut self) {
        let interfaces = match local_ipv4_interfaces() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                self.logger
                    .warn(format_args!("interface enumeration failed: {}", e));
                return;
            }
        };

        for entry in self.socks.iter_mut().skip(1) {
            entry.detected = false;
        }

        for iface in interfaces {
            if let Some(entry) = self.socks.iter_mut().find(|s| s.iface == Some(iface)) {
                entry.detected = true;
                continue;
            }

            match Self::open_sock(iface.ip, self.config.poll_interval) {
                Ok(sock) => self.socks.push(DiscoverSock {
                    sock,
                    iface: Some(iface),
                    detected: true,
                }),
                Err(e) => self
                    .logger
                    .debug(format_args!("failed to bind {}: {}", iface.ip, e)),
            }
        }

        self.socks.retain(|s| s.detected);
    }

    fn build_request(&mut self, device_type: u32, device_id: u32) -> Result<(), FrameError> {
        self.tx.reset();
        self.tx
            .write_tlv(Tag::DeviceType.as_u8(), &device_type.to_be_bytes())?;
        self.tx
            .write_tlv(Tag::DeviceId.as_u8(), &device_id.to_be_bytes())?;
        self.tx.seal_frame(FrameType::DiscoverReq.as_u16());
        Ok(())
    }

    /// Send one discovery request
    ///
    /// A zero `target_ip` broadcasts on every interface; otherwise the
    /// request goes to `target_ip`, from the interface on its subnet if
    /// there is one.
    pub fn send(
        &mut self,
        target_ip: Ipv4Addr,
        device_type: u32,
        device_id: u32,
    ) -> Result<(), DiscoverError> {
        if is_ip_multicast(target_ip) {
            return Err(DiscoverError::MulticastTarget(target_ip));
        }

        self.build_request(device_type, device_id)?;
        let port = self.config.port;
        let frame = self.tx.as_slice();

        if target_ip.is_unspecified() {
            let mut sent = false;
            for entry in self.socks.iter().skip(1) {
                if let Some(iface) = entry.iface {
                    let dest = SocketAddrV4::new(iface.broadcast(), port);
                    if entry.sock.send_to(frame, dest).is_ok() {
                        sent = true;
                    }
                }
            }
            if !sent {
                self.socks[0]
                    .sock
                    .send_to(frame, SocketAddrV4::new(Ipv4Addr::BROADCAST, port))?;
            }
            return Ok(());
        }

        let dest = SocketAddrV4::new(target_ip, port);
        let local = self
            .socks
            .iter()
            .skip(1)
            .find(|s| s.iface.map_or(false, |iface| iface.contains(target_ip)));

        match local {
            Some(entry) if entry.sock.send_to(frame, dest).is_ok() => Ok(()),
            _ => {
                self.socks[0].sock.send_to(frame, dest)?;
                Ok(())
            }
        }
    }

    /// Poll every socket once for a reply
    fn recv(&mut self) -> Option<DiscoveredDevice> {
        for index in 0..self.socks.len() {
            self.rx.reset();
            let received = self.socks[index].sock.recv_from(self.rx.recv_space());
            let (length, from) = match received {
                Ok(Some(reply)) => reply,
                Ok(None) | Err(_) => continue,
            };
            self.rx.commit_received(length);

            if let Some(device) = Self::parse_reply(&mut self.rx, *from.ip()) {
                return Some(device);
            }
        }
        None
    }

    fn parse_reply(rx: &mut FrameBuf, from: Ipv4Addr) -> Option<DiscoveredDevice> {
        match rx.open_frame() {
            FrameStatus::Complete(t) if t == FrameType::DiscoverRpy.as_u16() => {}
            _ => return None,
        }

        let mut device = DiscoveredDevice {
            ip_addr: from,
            device_type: 0,
            device_id: 0,
            tuner_count: 0,
        };

        while let Some((tag, value)) = rx.next_tlv() {
            match (Tag::from_u8(tag), value.len()) {
                (Some(Tag::DeviceType), 4) => {
                    device.device_type = u32::from_be_bytes([value[0], value[1], value[2], value[3]])
                }
                (Some(Tag::DeviceId), 4) => {
                    device.device_id = u32::from_be_bytes([value[0], value[1], value[2], value[3]])
                }
                (Some(Tag::TunerCount), 1) => device.tuner_count = value[0],
                _ => {}
            }
        }

        // Older firmware does not report a tuner count
        if device.tuner_count == 0 {
            device.tuner_count = default_tuner_count(device.device_id).unwrap_or(0);
        }

        Some(device)
    }

    /// Search for up to `max_count` devices
    pub fn find(
        &mut self,
        target_ip: Ipv4Addr,
        device_type: u32,
        device_id: u32,
        max_count: usize,
    ) -> Result<Vec<DiscoveredDevice>, DiscoverError> {
        use hdhr_protocol::types::{DEVICE_ID_WILDCARD, DEVICE_TYPE_WILDCARD};

        self.refresh_interfaces();

        let mut found: Vec<DiscoveredDevice> = Vec::new();
        if max_count == 0 {
            return Ok(found);
        }

        for _ in 0..self.config.rounds {
            self.send(target_ip, device_type, device_id)?;

            let deadline = Instant::now() + self.config.round_timeout;
            while Instant::now() < deadline {
                let Some(device) = self.recv() else {
                    continue;
                };

                if device_type != DEVICE_TYPE_WILDCARD && device.device_type != device_type {
                    continue;
                }
                if device_id != DEVICE_ID_WILDCARD && device.device_id != device_id {
                    continue;
                }
                if found.contains(&device) {
                    continue;
                }

                self.logger.debug(format_args!(
                    "found {:08X} at {} ({} tuners)",
                    device.device_id, device.ip_addr, device.tuner_count
                ));
                found.push(device);
                if found.len() >= max_count {
                    return Ok(found);
                }
            }
        }

        Ok(found)
    }
}

/// One-shot search with a throwaway [`Discover`]
pub fn find_devices(
    target_ip: Ipv4Addr,
    device_type: u32,
    device_id: u32,
    max_count: usize,
) -> Result<Vec<DiscoveredDevice>, DiscoverError> {
    let mut discover = Discover::new(Logger::default())?;
    discover.find(target_ip, device_type, device_id, max_count)
}
