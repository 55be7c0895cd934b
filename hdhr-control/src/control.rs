//! TCP control session
//!
//! A session targets one device by id, by IP, or both. The TCP connection
//! is opened lazily on the first request (after discovery has resolved the
//! device) and dropped whenever an exchange fails; every request gets one
//! retry on a fresh connection.

use crate::discover::{is_ip_multicast, Discover, DiscoverConfig, DiscoverError};
use crate::outcome::Outcome;
use hdhr_io::{Logger, SocketError, TcpSock};
use hdhr_protocol::frame::{tlv_str, FrameBuf, FrameError, FrameStatus};
use hdhr_protocol::types::{
    FrameType, Tag, CONTROL_TCP_PORT, DEVICE_ID_WILDCARD, DEVICE_TYPE_WILDCARD,
};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Attempts per request (first try plus one retry)
const SEND_RECV_ATTEMPTS: usize = 2;

/// Control errors
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("No device specified")]
    NoDevice,

    #[error("Control of multicast address {0} is not supported")]
    MulticastTarget(Ipv4Addr),

    #[error("Device not found")]
    NotFound,

    #[error("Discovery failed: {0}")]
    Discover(#[from] DiscoverError),

    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Corrupt reply frame")]
    Corrupt,

    #[error("Unexpected reply type 0x{0:04X}")]
    UnexpectedReply(u16),

    #[error("Reply carried neither a value nor an error message")]
    MissingValue,
}

/// Control session timeouts and ports
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    pub recv_timeout: Duration,
    /// TCP port of a device found through discovery
    pub control_port: u16,
    /// Discovery used to resolve the device before connecting
    pub discover: DiscoverConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            connect_timeout: Duration::from_millis(2500),
            send_timeout: Duration::from_millis(2500),
            recv_timeout: Duration::from_millis(2500),
            control_port: CONTROL_TCP_PORT,
            discover: DiscoverConfig::default(),
        }
    }
}

/// Get/set session with one device
pub struct ControlSession {
    desired_device_id: u32,
    desired_device_ip: Ipv4Addr,
    actual_device_id: u32,
    actual_device_ip: Ipv4Addr,
    /// Port of a direct endpoint
    port: u16,
    /// Skip discovery and connect straight to the desired address
    direct: bool,
    sock: Option<TcpSock>,
    tx: FrameBuf,
    rx: FrameBuf,
    config: ControlConfig,
    logger: Logger,
}

impl ControlSession {
    pub fn new(device_id: u32, device_ip: Ipv4Addr, logger: Logger) -> Self {
        let mut session = ControlSession {
            desired_device_id: 0,
            desired_device_ip: Ipv4Addr::UNSPECIFIED,
            actual_device_id: 0,
            actual_device_ip: Ipv4Addr::UNSPECIFIED,
            port: CONTROL_TCP_PORT,
            direct: false,
            sock: None,
            tx: FrameBuf::new(),
            rx: FrameBuf::new(),
            config: ControlConfig::default(),
            logger: logger.with_prefix("control"),
        };
        session.set_device(device_id, device_ip);
        session
    }

    /// Session to a known address, without discovery
    pub fn with_endpoint(addr: SocketAddrV4, device_id: u32, logger: Logger) -> Self {
        let mut session = Self::new(device_id, *addr.ip(), logger);
        session.port = addr.port();
        session.direct = true;
        session.actual_device_id = device_id;
        session.actual_device_ip = *addr.ip();
        session
    }

    pub fn set_config(&mut self, config: ControlConfig) {
        self.config = config;
    }

    /// Re-target the session, dropping any open connection
    pub fn set_device(&mut self, device_id: u32, device_ip: Ipv4Addr) {
        self.close();

        self.desired_device_id = device_id;
        self.desired_device_ip = device_ip;
        self.actual_device_id = 0;
        self.actual_device_ip = Ipv4Addr::UNSPECIFIED;
        self.direct = false;
        self.port = CONTROL_TCP_PORT;
    }

    pub fn close(&mut self) {
        self.sock = None;
    }

    pub fn is_connected(&self) -> bool {
        self.sock.is_some()
    }

    /// Open the connection if it is not already open
    pub fn connect(&mut self) -> Result<(), ControlError> {
        if self.sock.is_some() {
            return Ok(());
        }

        if self.desired_device_id == 0 && self.desired_device_ip.is_unspecified() {
            self.logger
                .error(format_args!("connect: no device specified"));
            return Err(ControlError::NoDevice);
        }
        if is_ip_multicast(self.desired_device_ip) {
            self.logger.error(format_args!(
                "connect: cannot use multicast ip address {}",
                self.desired_device_ip
            ));
            return Err(ControlError::MulticastTarget(self.desired_device_ip));
        }

        let mut port = self.port;
        if !self.direct {
            // An address alone matches whatever device answers there
            let device_id = match self.desired_device_id {
                0 => DEVICE_ID_WILDCARD,
                id => id,
            };
            let mut discover =
                Discover::with_config(self.config.discover.clone(), self.logger.clone())?;
            let found = discover.find(self.desired_device_ip, DEVICE_TYPE_WILDCARD, device_id, 1)?;
            let device = found.first().ok_or_else(|| {
                self.logger.error(format_args!("connect: device not found"));
                ControlError::NotFound
            })?;
            self.actual_device_id = device.device_id;
            self.actual_device_ip = device.ip_addr;
            port = self.config.control_port;
        }

        let addr = SocketAddrV4::new(self.actual_device_ip, port);
        let sock = TcpSock::connect(addr, self.config.connect_timeout).map_err(|e| {
            self.logger
                .error(format_args!("connect: failed to connect to {}: {}", addr, e));
            e
        })?;

        self.sock = Some(sock);
        Ok(())
    }

    /// Id of the connected device
    pub fn device_id(&mut self) -> Result<u32, ControlError> {
        self.connect()?;
        Ok(self.actual_device_id)
    }

    /// Address of the connected device
    pub fn device_ip(&mut self) -> Result<Ipv4Addr, ControlError> {
        self.connect()?;
        Ok(self.actual_device_ip)
    }

    pub fn device_id_requested(&self) -> u32 {
        self.desired_device_id
    }

    pub fn device_ip_requested(&self) -> Ipv4Addr {
        self.desired_device_ip
    }

    /// Local address of the control connection
    ///
    /// This is the address the device can reach us on, which makes it the
    /// right choice for a stream target.
    pub fn local_addr(&mut self) -> Result<Ipv4Addr, ControlError> {
        self.connect()?;
        match &self.sock {
            Some(sock) => Ok(*sock.local_addr()?.ip()),
            None => Err(ControlError::Socket(SocketError::Closed)),
        }
    }

    fn send_recv_once(&mut self, frame_type: FrameType) -> Result<(), ControlError> {
        self.connect()?;
        let sock = self
            .sock
            .as_mut()
            .ok_or(ControlError::Socket(SocketError::Closed))?;

        sock.send(self.tx.as_slice(), self.config.send_timeout)?;

        self.rx.reset();
        let deadline = Instant::now() + self.config.recv_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ControlError::Socket(SocketError::Timeout));
            }

            let space = self.rx.recv_space();
            if space.is_empty() {
                return Err(ControlError::Corrupt);
            }
            let n = sock.recv(space, remaining)?;
            self.rx.commit_received(n);

            match self.rx.open_frame() {
                FrameStatus::Incomplete => continue,
                FrameStatus::Corrupt => return Err(ControlError::Corrupt),
                FrameStatus::Complete(t) if t == frame_type.reply_type() => return Ok(()),
                FrameStatus::Complete(t) => return Err(ControlError::UnexpectedReply(t)),
            }
        }
    }

    /// Send the frame in `tx` and wait for its reply in `rx`
    fn send_recv(&mut self, frame_type: FrameType) -> Result<(), ControlError> {
        self.tx.seal_frame(frame_type.as_u16());

        let mut last_error = ControlError::NotFound;
        for attempt in 0..SEND_RECV_ATTEMPTS {
            match self.send_recv_once(frame_type) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.logger
                        .debug(format_args!("send_recv attempt {}: {}", attempt + 1, e));
                    self.close();
                    last_error = e;
                }
            }
        }

        self.logger.error(format_args!("send_recv: {}", last_error));
        Err(last_error)
    }

    fn get_set(&mut self, name: &str, value: Option<&str>, lockkey: u32) -> Outcome<String> {
        if let Err(e) = self.build_get_set(name, value, lockkey) {
            return Outcome::Failure(e.into());
        }

        if let Err(e) = self.send_recv(FrameType::GetSetReq) {
            return Outcome::Failure(e);
        }

        while let Some((tag, data)) = self.rx.next_tlv() {
            match Tag::from_u8(tag) {
                Some(Tag::GetSetValue) => return Outcome::Ok(tlv_str(data)),
                Some(Tag::ErrorMessage) => return Outcome::Rejected(tlv_str(data)),
                _ => {}
            }
        }

        self.logger
            .error(format_args!("get_set {}: missing response tags", name));
        Outcome::Failure(ControlError::MissingValue)
    }

    fn build_get_set(
        &mut self,
        name: &str,
        value: Option<&str>,
        lockkey: u32,
    ) -> Result<(), FrameError> {
        self.tx.reset();
        self.tx.write_tlv_str(Tag::GetSetName.as_u8(), name)?;
        if let Some(value) = value {
            self.tx.write_tlv_str(Tag::GetSetValue.as_u8(), value)?;
        }
        if lockkey != 0 {
            self.tx
                .write_tlv(Tag::GetSetLockKey.as_u8(), &lockkey.to_be_bytes())?;
        }
        Ok(())
    }

    /// Read a variable
    pub fn get(&mut self, name: &str) -> Outcome<String> {
        self.get_set(name, None, 0)
    }

    /// Write a variable; the reply carries the value now in effect
    pub fn set(&mut self, name: &str, value: &str) -> Outcome<String> {
        self.get_set(name, Some(value), 0)
    }

    /// Write a variable on a locked tuner
    pub fn set_with_lockkey(&mut self, name: &str, value: &str, lockkey: u32) -> Outcome<String> {
        self.get_set(name, Some(value), lockkey)
    }
}
