//! Device handle
//!
//! A [`Device`] addresses one tuner, either on a device reached over the
//! control protocol or on a multicast stream (receive only). It holds the
//! tuner lock key once one has been acquired and passes it on every set.

use crate::channelscan;
use bytes::Bytes;
use hdhr_control::{ControlConfig, ControlError, ControlSession, Outcome};
use hdhr_io::{resolve_ipv4, Clock, Logger, SocketError, SystemClock};
use hdhr_protocol::status::{StreamTarget, TargetProtocol, TunerStatus};
use hdhr_protocol::types::{DEVICE_ID_WILDCARD, VIDEO_DATA_BUFFER_SIZE_1S};
use hdhr_protocol::validate_device_id;
use hdhr_stream::{VideoConfig, VideoError, VideoSocket, VideoStats};
use rand::Rng;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Legacy model reported when the device does not know `/sys/model`
pub const LEGACY_MODEL: &str = "hdhomerun_atsc";

/// Device errors
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No device specified")]
    NoDevice,

    #[error("Invalid device id: {0:08X}")]
    InvalidDeviceId(u32),

    #[error("Invalid device string: {0}")]
    InvalidDeviceString(String),

    #[error("Invalid tuner: {0}")]
    InvalidTuner(String),

    #[error("{0} is a multicast address")]
    MulticastAddress(Ipv4Addr),

    #[error("{0} is not a multicast address")]
    NotMulticast(Ipv4Addr),

    #[error("Video error: {0}")]
    Video(#[from] VideoError),
}

/// One tuner of one device
pub struct Device {
    /// `None` for multicast devices
    control: Option<ControlSession>,
    multicast: Option<SocketAddrV4>,
    device_id: u32,
    tuner: u32,
    lockkey: u32,
    name: String,
    model: Option<String>,
    video: Option<VideoSocket>,
    video_config: VideoConfig,
    clock: Arc<dyn Clock>,
    logger: Logger,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("lockkey", &self.lockkey)
            .finish()
    }
}

fn video_failure(e: VideoError) -> ControlError {
    match e {
        VideoError::Socket(e) => ControlError::Socket(e),
        VideoError::Thread(e) => ControlError::Socket(SocketError::Io(e)),
    }
}

impl Device {
    fn build(control: Option<ControlSession>, device_id: u32, tuner: u32, logger: Logger) -> Self {
        let mut device = Device {
            control,
            multicast: None,
            device_id,
            tuner,
            lockkey: 0,
            name: String::new(),
            model: None,
            video: None,
            video_config: VideoConfig {
                buffer_size: VIDEO_DATA_BUFFER_SIZE_1S * 2,
                ..VideoConfig::default()
            },
            clock: Arc::new(SystemClock),
            logger,
        };
        device.update_name();
        device
    }

    /// Device by id, IP address, or both
    pub fn new(
        device_id: u32,
        device_ip: Ipv4Addr,
        tuner: u32,
        logger: Logger,
    ) -> Result<Self, DeviceError> {
        if device_ip.is_multicast() {
            return Err(DeviceError::MulticastAddress(device_ip));
        }
        if device_id == 0 && device_ip.is_unspecified() {
            return Err(DeviceError::NoDevice);
        }
        if device_id != 0 && device_id != DEVICE_ID_WILDCARD && !validate_device_id(device_id) {
            return Err(DeviceError::InvalidDeviceId(device_id));
        }

        let control = ControlSession::new(device_id, device_ip, logger.clone());
        Ok(Self::build(Some(control), device_id, tuner, logger))
    }

    /// Device at a fixed control address, without discovery
    pub fn with_endpoint(addr: SocketAddrV4, device_id: u32, tuner: u32, logger: Logger) -> Self {
        let control = ControlSession::with_endpoint(addr, device_id, logger.clone());
        Self::build(Some(control), device_id, tuner, logger)
    }

    /// Receive-only device for a multicast stream
    pub fn multicast(ip: Ipv4Addr, port: u16, logger: Logger) -> Result<Self, DeviceError> {
        if !ip.is_multicast() {
            return Err(DeviceError::NotMulticast(ip));
        }
        let mut device = Self::build(None, 0, 0, logger);
        device.multicast = Some(SocketAddrV4::new(ip, port));
        device.video_config.listen_port = port;
        device.video_config.allow_port_reuse = true;
        device.update_name();
        Ok(device)
    }

    /// Parse a device string
    ///
    /// Accepted forms: `<device id>[-<tuner>]`, `<ip>[-<tuner>]`,
    /// `<multicast ip>:<port>` and `<hostname>[-<tuner>]`.
    pub fn parse(text: &str, logger: Logger) -> Result<Self, DeviceError> {
        let text = text.trim();
        let invalid = || DeviceError::InvalidDeviceString(text.to_string());

        if let Some((host, port)) = text.split_once(':') {
            let ip: Ipv4Addr = host.parse().map_err(|_| invalid())?;
            let port: u16 = port.parse().map_err(|_| invalid())?;
            return Self::multicast(ip, port, logger);
        }

        let (base, tuner) = match text.rsplit_once('-') {
            Some((base, tuner)) if !tuner.is_empty() && tuner.bytes().all(|b| b.is_ascii_digit()) => {
                (base, tuner.parse::<u32>().map_err(|_| invalid())?)
            }
            _ => (text, 0),
        };
        if base.is_empty() {
            return Err(invalid());
        }

        if let Ok(ip) = base.parse::<Ipv4Addr>() {
            return Self::new(0, ip, tuner, logger);
        }

        if base.len() <= 8 && base.bytes().all(|b| b.is_ascii_hexdigit()) {
            let device_id = u32::from_str_radix(base, 16).map_err(|_| invalid())?;
            return Self::new(device_id, Ipv4Addr::UNSPECIFIED, tuner, logger);
        }

        match resolve_ipv4(base) {
            Some(ip) => Self::new(0, ip, tuner, logger),
            None => Err(invalid()),
        }
    }

    /// Replace the clock used for lock and stream settling delays
    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    pub fn set_video_config(&mut self, config: VideoConfig) {
        self.video_config = config;
    }

    /// Timeouts and ports of the control session; no effect on multicast devices
    pub fn set_control_config(&mut self, config: ControlConfig) {
        if let Some(control) = self.control.as_mut() {
            control.set_config(config);
        }
    }

    fn update_name(&mut self) {
        self.name = match (self.multicast, &self.control) {
            (Some(addr), _) => addr.to_string(),
            _ if self.device_id != 0 && self.device_id != DEVICE_ID_WILDCARD => {
                format!("{:08X}-{}", self.device_id, self.tuner)
            }
            (None, Some(control)) => format!("{}-{}", control.device_ip_requested(), self.tuner),
            (None, None) => format!("-{}", self.tuner),
        };
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn is_multicast(&self) -> bool {
        self.multicast.is_some()
    }

    /// Id of the device, resolved through discovery if it was addressed by IP
    ///
    /// Multicast devices have no id and report 0.
    pub fn device_id(&mut self) -> Result<u32, ControlError> {
        if self.device_id != 0 && self.device_id != DEVICE_ID_WILDCARD {
            return Ok(self.device_id);
        }
        let Some(control) = self.control.as_mut() else {
            return Ok(0);
        };
        self.device_id = control.device_id()?;
        self.update_name();
        Ok(self.device_id)
    }

    pub fn device_ip(&mut self) -> Result<Ipv4Addr, ControlError> {
        match (self.multicast, self.control.as_mut()) {
            (Some(addr), _) => Ok(*addr.ip()),
            (None, Some(control)) => control.device_ip(),
            (None, None) => Err(ControlError::NoDevice),
        }
    }

    pub fn device_id_requested(&self) -> u32 {
        self.control
            .as_ref()
            .map_or(0, |c| c.device_id_requested())
    }

    pub fn device_ip_requested(&self) -> Ipv4Addr {
        match (self.multicast, &self.control) {
            (Some(addr), _) => *addr.ip(),
            (None, Some(control)) => control.device_ip_requested(),
            (None, None) => Ipv4Addr::UNSPECIFIED,
        }
    }

    pub fn tuner(&self) -> u32 {
        self.tuner
    }

    pub fn set_tuner(&mut self, tuner: u32) -> Result<(), DeviceError> {
        if self.multicast.is_some() && tuner != 0 {
            return Err(DeviceError::InvalidTuner(tuner.to_string()));
        }
        self.tuner = tuner;
        self.update_name();
        Ok(())
    }

    /// Set the tuner from "1", "/tuner1" or "tuner1"
    pub fn set_tuner_from_str(&mut self, text: &str) -> Result<(), DeviceError> {
        let digits = text
            .trim()
            .trim_start_matches('/')
            .trim_start_matches("tuner");
        let tuner = digits
            .parse::<u32>()
            .map_err(|_| DeviceError::InvalidTuner(text.to_string()))?;
        self.set_tuner(tuner)
    }

    fn control(&mut self) -> Result<&mut ControlSession, ControlError> {
        match self.control.as_mut() {
            Some(control) => Ok(control),
            None => {
                self.logger
                    .error(format_args!("{}: no control session", self.name));
                Err(ControlError::NoDevice)
            }
        }
    }

    fn tuner_var(&self, item: &str) -> String {
        format!("/tuner{}/{}", self.tuner, item)
    }

    /// Read any variable
    pub fn get_var(&mut self, name: &str) -> Outcome<String> {
        match self.control() {
            Ok(control) => control.get(name),
            Err(e) => Outcome::Failure(e),
        }
    }

    /// Write any variable, passing the held lock key
    pub fn set_var(&mut self, name: &str, value: &str) -> Outcome<String> {
        let lockkey = self.lockkey;
        match self.control() {
            Ok(control) => control.set_with_lockkey(name, value, lockkey),
            Err(e) => Outcome::Failure(e),
        }
    }

    /// Raw status line and its parsed form
    pub fn get_tuner_status(&mut self) -> Outcome<(String, TunerStatus)> {
        let name = self.tuner_var("status");
        self.get_var(&name).map(|raw| {
            let status = TunerStatus::parse(&raw);
            (raw, status)
        })
    }

    pub fn get_tuner_streaminfo(&mut self) -> Outcome<String> {
        let name = self.tuner_var("streaminfo");
        self.get_var(&name)
    }

    pub fn get_tuner_channel(&mut self) -> Outcome<String> {
        let name = self.tuner_var("channel");
        self.get_var(&name)
    }

    pub fn get_tuner_channelmap(&mut self) -> Outcome<String> {
        let name = self.tuner_var("channelmap");
        self.get_var(&name)
    }

    pub fn get_tuner_filter(&mut self) -> Outcome<String> {
        let name = self.tuner_var("filter");
        self.get_var(&name)
    }

    pub fn get_tuner_program(&mut self) -> Outcome<String> {
        let name = self.tuner_var("program");
        self.get_var(&name)
    }

    pub fn get_tuner_target(&mut self) -> Outcome<String> {
        let name = self.tuner_var("target");
        self.get_var(&name)
    }

    /// Who holds the tuner lock ("none" if nobody)
    pub fn get_tuner_lockkey_owner(&mut self) -> Outcome<String> {
        let name = self.tuner_var("lockkey");
        self.get_var(&name)
    }

    /// Firmware version string and its leading number
    pub fn get_version(&mut self) -> Outcome<(String, u32)> {
        self.get_var("/sys/version").map(|version| {
            let digits: String = version.chars().take_while(|c| c.is_ascii_digit()).collect();
            let number = digits.parse().unwrap_or(0);
            (version, number)
        })
    }

    /// Model string, cached after the first successful read
    pub fn get_model(&mut self) -> Outcome<String> {
        if let Some(model) = &self.model {
            return Outcome::Ok(model.clone());
        }

        let model = match self.get_var("/sys/model") {
            Outcome::Ok(model) => model,
            Outcome::Rejected(_) => LEGACY_MODEL.to_string(),
            Outcome::Failure(e) => return Outcome::Failure(e),
        };
        self.model = Some(model.clone());
        Outcome::Ok(model)
    }

    /// Feature list, or the rest of the line starting with `prefix`
    pub fn get_supported(&mut self, prefix: Option<&str>) -> Outcome<String> {
        self.get_var("/sys/features").and_then(|features| {
            let Some(prefix) = prefix else {
                return Outcome::Ok(features);
            };
            match features.find(prefix) {
                Some(idx) => {
                    let rest = &features[idx + prefix.len()..];
                    let line = rest.split('\n').next().unwrap_or("");
                    Outcome::Ok(line.to_string())
                }
                None => Outcome::Rejected(format!("{} not supported", prefix)),
            }
        })
    }

    pub fn set_tuner_channel(&mut self, channel: &str) -> Outcome<String> {
        let name = self.tuner_var("channel");
        self.set_var(&name, channel)
    }

    pub fn set_tuner_channelmap(&mut self, channelmap: &str) -> Outcome<String> {
        let name = self.tuner_var("channelmap");
        self.set_var(&name, channelmap)
    }

    pub fn set_tuner_filter(&mut self, filter: &str) -> Outcome<String> {
        let name = self.tuner_var("filter");
        self.set_var(&name, filter)
    }

    pub fn set_tuner_program(&mut self, program: &str) -> Outcome<String> {
        let name = self.tuner_var("program");
        self.set_var(&name, program)
    }

    pub fn set_tuner_target(&mut self, target: &str) -> Outcome<String> {
        let name = self.tuner_var("target");
        self.set_var(&name, target)
    }

    /// Point the tuner's stream at this machine's video socket
    pub fn set_tuner_target_to_local(&mut self, protocol: TargetProtocol) -> Outcome<String> {
        let local_ip = match self.control() {
            Ok(control) => match control.local_addr() {
                Ok(ip) => ip,
                Err(e) => return Outcome::Failure(e),
            },
            Err(e) => return Outcome::Failure(e),
        };
        let local_port = match self.video_socket() {
            Ok(video) => video.local_port(),
            Err(e) => {
                return Outcome::Failure(match e {
                    DeviceError::Video(e) => video_failure(e),
                    _ => ControlError::Socket(SocketError::Closed),
                })
            }
        };

        let target = StreamTarget::new(protocol, SocketAddrV4::new(local_ip, local_port));
        self.set_tuner_target(&target.to_string())
    }

    /// Local address the device would stream to
    pub fn local_machine_addr(&mut self) -> Result<Ipv4Addr, ControlError> {
        self.control()?.local_addr()
    }

    /// Held lock key (0 = none)
    pub fn lockkey(&self) -> u32 {
        self.lockkey
    }

    /// Acquire the tuner lock with a fresh random key
    ///
    /// Any previously held key is presented so a lock can be renewed. On
    /// anything but success the held key is cleared.
    pub fn lockkey_request(&mut self) -> Outcome<()> {
        if self.multicast.is_some() {
            return Outcome::Ok(());
        }

        let new_lockkey: u32 = rand::thread_rng().gen_range(1..=u32::MAX);
        let name = self.tuner_var("lockkey");
        match self.set_var(&name, &new_lockkey.to_string()) {
            Outcome::Ok(_) => {
                self.lockkey = new_lockkey;
                Outcome::Ok(())
            }
            other => {
                self.lockkey = 0;
                other.map(|_| ())
            }
        }
    }

    /// Give up the tuner lock
    pub fn lockkey_release(&mut self) -> Outcome<()> {
        if self.multicast.is_some() || self.lockkey == 0 {
            return Outcome::Ok(());
        }

        let name = self.tuner_var("lockkey");
        let outcome = self.set_var(&name, "none");
        self.lockkey = 0;
        outcome.map(|_| ())
    }

    /// Break someone else's lock
    pub fn lockkey_force(&mut self) -> Outcome<()> {
        if self.multicast.is_some() {
            return Outcome::Ok(());
        }

        let name = self.tuner_var("lockkey");
        let outcome = match self.control() {
            Ok(control) => control.set_with_lockkey(&name, "force", 0),
            Err(e) => Outcome::Failure(e),
        };
        self.lockkey = 0;
        outcome.map(|_| ())
    }

    /// Adopt a lock key acquired elsewhere
    pub fn lockkey_use_value(&mut self, lockkey: u32) {
        self.lockkey = lockkey;
    }

    /// Wait until the tuner reports lock, no signal, or gives up
    pub fn wait_for_lock(&mut self) -> Outcome<TunerStatus> {
        let clock = Arc::clone(&self.clock);
        channelscan::wait_for_lock(self, clock.as_ref())
    }

    /// The video socket, created on first use
    pub fn video_socket(&mut self) -> Result<&VideoSocket, DeviceError> {
        if self.video.is_none() {
            let video = VideoSocket::create(self.video_config.clone(), self.logger.clone())?;
            self.video = Some(video);
        }
        match &self.video {
            Some(video) => Ok(video),
            None => Err(DeviceError::Video(VideoError::Socket(SocketError::Closed))),
        }
    }

    /// Start streaming to this machine
    ///
    /// Joins the group for multicast devices; otherwise sets the tuner
    /// target, preferring RTP.
    pub fn stream_start(&mut self) -> Outcome<()> {
        let multicast = self.multicast;
        match self.video_socket() {
            Ok(video) => {
                video.flush();
                if let Some(addr) = multicast {
                    if let Err(e) = video.join_multicast_group(*addr.ip(), Ipv4Addr::UNSPECIFIED) {
                        return Outcome::Failure(ControlError::Socket(e));
                    }
                }
            }
            Err(e) => {
                self.logger
                    .error(format_args!("{}: failed to create video socket: {}", self.name, e));
                return Outcome::Failure(match e {
                    DeviceError::Video(e) => video_failure(e),
                    _ => ControlError::Socket(SocketError::Closed),
                });
            }
        }

        if multicast.is_none() {
            let outcome = match self.set_tuner_target_to_local(TargetProtocol::Rtp) {
                Outcome::Rejected(_) => self.set_tuner_target_to_local(TargetProtocol::Udp),
                other => other,
            };
            if !outcome.is_ok() {
                return outcome.map(|_| ());
            }
        }

        // Let data from before the target change drain, then discard it
        hdhr_io::sleep_minimum(self.clock.as_ref(), Duration::from_millis(64));
        self.stream_flush();
        Outcome::Ok(())
    }

    /// Take up to `max_size` bytes of buffered stream
    pub fn stream_recv(&self, max_size: usize) -> Bytes {
        match &self.video {
            Some(video) => video.recv(max_size),
            None => Bytes::new(),
        }
    }

    pub fn stream_flush(&self) {
        if let Some(video) = &self.video {
            video.flush();
        }
    }

    /// Stop the stream: leave the group or clear the tuner target
    pub fn stream_stop(&mut self) {
        match self.multicast {
            Some(addr) => {
                if let Some(video) = &self.video {
                    let _ = video.leave_multicast_group(*addr.ip(), Ipv4Addr::UNSPECIFIED);
                }
            }
            None => {
                let _ = self.set_tuner_target("none");
            }
        }
    }

    pub fn video_stats(&self) -> VideoStats {
        self.video
            .as_ref()
            .map(|v| v.stats())
            .unwrap_or_default()
    }

    pub fn log_video_stats(&self) {
        if let Some(video) = &self.video {
            video.log_stats();
        }
    }
}

impl FromStr for Device {
    type Err = DeviceError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Device::parse(text, Logger::default())
    }
}
