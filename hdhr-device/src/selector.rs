//! Device selector
//!
//! Holds a pool of candidate tuners and hands out the first one whose lock
//! can be acquired. A tuner locked by a dead process on this machine (its
//! stream target port is no longer bound) is reclaimed by forcing the lock.

use crate::device::Device;
use hdhr_control::Outcome;
use hdhr_io::{Logger, UdpSock};
use hdhr_protocol::status::StreamTarget;
use std::fs;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;

/// Result of [`DeviceSelector::choose_and_lock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Index of the device now locked
    Chosen(usize),
    NoneAvailable,
}

/// Pool of candidate tuners
pub struct DeviceSelector {
    devices: Vec<Device>,
    logger: Logger,
}

impl DeviceSelector {
    pub fn new(logger: Logger) -> Self {
        DeviceSelector {
            devices: Vec::new(),
            logger: logger.with_prefix("selector"),
        }
    }

    fn same_tuner(a: &Device, b: &Device) -> bool {
        a.device_id_requested() == b.device_id_requested()
            && a.device_ip_requested() == b.device_ip_requested()
            && a.tuner() == b.tuner()
    }

    /// Add a device; duplicates of one already present are dropped
    ///
    /// Returns false for a duplicate.
    pub fn add_device(&mut self, device: Device) -> bool {
        if self.devices.iter().any(|d| Self::same_tuner(d, &device)) {
            return false;
        }
        self.devices.push(device);
        true
    }

    pub fn remove_device(&mut self, device_id: u32, tuner: u32) -> Option<Device> {
        let index = self.position(device_id, tuner)?;
        Some(self.devices.remove(index))
    }

    fn position(&self, device_id: u32, tuner: u32) -> Option<usize> {
        self.devices
            .iter()
            .position(|d| d.device_id_requested() == device_id && d.tuner() == tuner)
    }

    pub fn find_device(&self, device_id: u32, tuner: u32) -> Option<&Device> {
        self.position(device_id, tuner).map(|i| &self.devices[i])
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn device(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    pub fn device_mut(&mut self, index: usize) -> Option<&mut Device> {
        self.devices.get_mut(index)
    }

    /// Add one device per line; `#` starts a comment
    ///
    /// Unparsable lines are logged and skipped. Returns the number added.
    pub fn load_from_str(&mut self, text: &str) -> usize {
        let mut added = 0;
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            match Device::parse(line, self.logger.clone()) {
                Ok(device) => {
                    if self.add_device(device) {
                        added += 1;
                    }
                }
                Err(e) => self
                    .logger
                    .warn(format_args!("ignoring \"{}\": {}", line, e)),
            }
        }
        added
    }

    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> io::Result<usize> {
        let text = fs::read_to_string(path)?;
        Ok(self.load_from_str(&text))
    }

    /// Lock the preferred device if possible, else the first free one
    pub fn choose_and_lock(&mut self, preferred: Option<usize>) -> Selection {
        if let Some(index) = preferred.filter(|&i| i < self.devices.len()) {
            if self.choose_test(index) {
                return Selection::Chosen(index);
            }
        }

        for index in 0..self.devices.len() {
            if Some(index) == preferred {
                continue;
            }
            if self.choose_test(index) {
                return Selection::Chosen(index);
            }
        }

        self.logger.info(format_args!("no devices available"));
        Selection::NoneAvailable
    }

    /// Try to lock one device, reclaiming it from a dead local process
    pub fn choose_test(&mut self, index: usize) -> bool {
        let logger = self.logger.clone();
        let Some(device) = self.devices.get_mut(index) else {
            return false;
        };
        let name = device.name().to_string();

        match device.lockkey_request() {
            Outcome::Ok(()) => {
                logger.info(format_args!("chose {}", name));
                return true;
            }
            Outcome::Failure(e) => {
                logger.info(format_args!("{} communication error: {}", name, e));
                return false;
            }
            Outcome::Rejected(_) => {}
        }

        let target = match device.get_tuner_target() {
            Outcome::Ok(target) => target,
            Outcome::Rejected(_) => {
                logger.info(format_args!("{} in use, failed to read target", name));
                return false;
            }
            Outcome::Failure(e) => {
                logger.info(format_args!("{} communication error: {}", name, e));
                return false;
            }
        };

        if target == "none" {
            logger.info(format_args!("{} in use, no target set", name));
            return false;
        }

        let Some(stream_target) = StreamTarget::parse(&target).filter(|t| t.protocol.is_some())
        else {
            logger.info(format_args!("{} in use by {}", name, target));
            return false;
        };

        let local_ip = match device.local_machine_addr() {
            Ok(ip) => ip,
            Err(e) => {
                logger.info(format_args!("{} communication error: {}", name, e));
                return false;
            }
        };
        if *stream_target.addr.ip() != local_ip {
            logger.info(format_args!("{} in use by {}", name, target));
            return false;
        }

        let port = stream_target.addr.port();
        let in_use = UdpSock::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port), false).is_err();
        if in_use {
            logger.info(format_args!("{} in use by local machine", name));
            return false;
        }

        match device.lockkey_force() {
            Outcome::Ok(()) => {}
            Outcome::Rejected(_) => {
                logger.info(format_args!(
                    "{} in use by local machine, dead target, failed to force release lockkey",
                    name
                ));
                return false;
            }
            Outcome::Failure(e) => {
                logger.info(format_args!("{} communication error: {}", name, e));
                return false;
            }
        }
        logger.info(format_args!(
            "{} in use by local machine, dead target, lockkey force successful",
            name
        ));

        match device.lockkey_request() {
            Outcome::Ok(()) => {
                logger.info(format_args!("chose {}", name));
                true
            }
            Outcome::Rejected(msg) => {
                logger.info(format_args!("{} still in use after lockkey force ({})", name, msg));
                false
            }
            Outcome::Failure(e) => {
                logger.info(format_args!("{} communication error: {}", name, e));
                false
            }
        }
    }
}
