//! Fake tuner appliance for integration tests
//!
//! Serves the get/set control protocol over TCP on loopback, one thread per
//! connection, with tuner 0 lock key semantics and a table of frequencies
//! that carry a signal. A UDP responder on loopback answers discovery
//! requests for its device id.

#![allow(dead_code)]

use hdhr_control::{ControlConfig, DiscoverConfig};
use hdhr_device::Device;
use hdhr_io::Logger;
use hdhr_protocol::frame::{tlv_str, FrameBuf, FrameStatus};
use hdhr_protocol::types::{FrameType, Tag, DEVICE_ID_WILDCARD, DEVICE_TYPE_TUNER};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const MOCK_DEVICE_ID: u32 = 0x1010_0000;

const LOCKED: &str = "ERROR: resource locked";
const UNKNOWN: &str = "ERROR: unknown getset variable";

/// Variables plus lock state of the fake device
#[derive(Debug, Default)]
pub struct MockState {
    pub vars: HashMap<String, String>,
    /// Lock key held on tuner 0
    pub lockkey: Option<u32>,
    /// Frequency -> streaminfo for frequencies with a signal
    pub stations: HashMap<u32, String>,
    /// Every variable name requested, in order
    pub requests: Vec<String>,
    /// Device id of every discovery request, in order
    pub discover_requests: Vec<u32>,
}

impl MockState {
    pub fn new() -> Self {
        let mut state = MockState::default();
        state.set("/tuner0/channel", "none");
        state.set("/tuner0/channelmap", "us-bcast");
        state.set("/tuner0/target", "none");
        state.set("/tuner0/status", "ch=none lock=none ss=0 snq=0 seq=0 bps=0 pps=0");
        state.set("/tuner0/streaminfo", "none\n");
        state
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    pub fn with_station(mut self, frequency: u32, streaminfo: &str) -> Self {
        self.stations.insert(frequency, streaminfo.to_string());
        self
    }

    fn tune(&mut self, channel: &str) {
        let frequency = channel
            .strip_prefix("auto:")
            .and_then(|f| f.parse::<u32>().ok());

        let (status, streaminfo) = match frequency.and_then(|f| self.stations.get(&f)) {
            Some(streaminfo) => (
                format!("ch={} lock=8vsb ss=90 snq=85 seq=100 bps=19392712 pps=0", channel),
                streaminfo.clone(),
            ),
            None => (
                format!("ch={} lock=none ss=0 snq=0 seq=0 bps=0 pps=0", channel),
                "none\n".to_string(),
            ),
        };
        self.set("/tuner0/status", &status);
        self.set("/tuner0/streaminfo", &streaminfo);
    }

    fn handle(&mut self, name: &str, value: Option<&str>, lockkey: Option<u32>) -> Result<String, String> {
        self.requests.push(name.to_string());
        let holder_ok = self.lockkey.is_none() || lockkey == self.lockkey;

        let Some(value) = value else {
            if name == "/tuner0/lockkey" {
                return Ok(self
                    .lockkey
                    .map_or_else(|| "none".to_string(), |_| "127.0.0.1".to_string()));
            }
            return self.vars.get(name).cloned().ok_or_else(|| UNKNOWN.to_string());
        };

        if name == "/tuner0/lockkey" {
            return match value {
                "force" => {
                    self.lockkey = None;
                    Ok("none".to_string())
                }
                "none" if holder_ok => {
                    self.lockkey = None;
                    Ok("none".to_string())
                }
                _ if !holder_ok => Err(LOCKED.to_string()),
                key => {
                    let key: u32 = key.parse().map_err(|_| "ERROR: invalid lockkey".to_string())?;
                    self.lockkey = Some(key);
                    Ok(value.to_string())
                }
            };
        }

        if name.starts_with("/tuner0/") && !holder_ok {
            return Err(LOCKED.to_string());
        }
        if !self.vars.contains_key(name) {
            return Err(UNKNOWN.to_string());
        }

        self.set(name, value);
        if name == "/tuner0/channel" {
            self.tune(value);
        }
        Ok(value.to_string())
    }
}

/// Handle to a running fake device
pub struct MockDevice {
    pub addr: SocketAddrV4,
    /// Where discovery requests are answered
    pub discover_addr: SocketAddrV4,
    pub state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn spawn(state: MockState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(state));

        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    break;
                };
                let state = Arc::clone(&shared);
                thread::spawn(move || serve(stream, &state));
            }
        });

        let responder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let discover_port = responder.local_addr().unwrap().port();
        let shared = Arc::clone(&state);
        thread::spawn(move || answer_discovery(responder, &shared));

        MockDevice {
            addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, port),
            discover_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, discover_port),
            state,
        }
    }

    /// Control settings that find this device through discovery
    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            control_port: self.addr.port(),
            discover: DiscoverConfig {
                port: self.discover_addr.port(),
                round_timeout: Duration::from_millis(300),
                ..DiscoverConfig::default()
            },
            ..ControlConfig::default()
        }
    }

    pub fn discover_requests(&self) -> Vec<u32> {
        self.state.lock().discover_requests.clone()
    }

    /// A device handle for tuner 0
    pub fn device(&self) -> Device {
        Device::with_endpoint(self.addr, MOCK_DEVICE_ID, 0, Logger::default())
    }

    pub fn var(&self, name: &str) -> Option<String> {
        self.state.lock().vars.get(name).cloned()
    }

    pub fn lockkey(&self) -> Option<u32> {
        self.state.lock().lockkey
    }

    pub fn request_count(&self, name: &str) -> usize {
        self.state.lock().requests.iter().filter(|r| *r == name).count()
    }
}

fn answer_discovery(sock: UdpSocket, state: &Mutex<MockState>) {
    let mut rx = FrameBuf::new();
    let mut tx = FrameBuf::new();

    loop {
        rx.reset();
        let (n, from) = match sock.recv_from(rx.recv_space()) {
            Ok(received) => received,
            Err(_) => return,
        };
        rx.commit_received(n);
        match rx.open_frame() {
            FrameStatus::Complete(t) if t == FrameType::DiscoverReq.as_u16() => {}
            _ => continue,
        }

        let mut device_id = DEVICE_ID_WILDCARD;
        while let Some((tag, data)) = rx.next_tlv() {
            if Tag::from_u8(tag) == Some(Tag::DeviceId) && data.len() == 4 {
                device_id = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
            }
        }
        state.lock().discover_requests.push(device_id);
        if device_id != DEVICE_ID_WILDCARD && device_id != MOCK_DEVICE_ID {
            continue;
        }

        tx.reset();
        tx.write_tlv(Tag::DeviceType.as_u8(), &DEVICE_TYPE_TUNER.to_be_bytes())
            .unwrap();
        tx.write_tlv(Tag::DeviceId.as_u8(), &MOCK_DEVICE_ID.to_be_bytes())
            .unwrap();
        tx.write_tlv(Tag::TunerCount.as_u8(), &[2]).unwrap();
        tx.seal_frame(FrameType::DiscoverRpy.as_u16());
        let _ = sock.send_to(tx.as_slice(), from);
    }
}

fn read_request(stream: &mut TcpStream, rx: &mut FrameBuf) -> bool {
    rx.reset();
    loop {
        let n = match stream.read(rx.recv_space()) {
            Ok(0) | Err(_) => return false,
            Ok(n) => n,
        };
        rx.commit_received(n);
        match rx.open_frame() {
            FrameStatus::Incomplete => continue,
            FrameStatus::Complete(t) => return t == FrameType::GetSetReq.as_u16(),
            FrameStatus::Corrupt => return false,
        }
    }
}

fn serve(mut stream: TcpStream, state: &Mutex<MockState>) {
    let mut rx = FrameBuf::new();
    let mut tx = FrameBuf::new();

    while read_request(&mut stream, &mut rx) {
        let mut name = String::new();
        let mut value = None;
        let mut lockkey = None;
        while let Some((tag, data)) = rx.next_tlv() {
            match Tag::from_u8(tag) {
                Some(Tag::GetSetName) => name = tlv_str(data),
                Some(Tag::GetSetValue) => value = Some(tlv_str(data)),
                Some(Tag::GetSetLockKey) if data.len() == 4 => {
                    lockkey = Some(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
                }
                _ => {}
            }
        }

        let reply = state.lock().handle(&name, value.as_deref(), lockkey);

        tx.reset();
        tx.write_tlv_str(Tag::GetSetName.as_u8(), &name).unwrap();
        match reply {
            Ok(value) => tx.write_tlv_str(Tag::GetSetValue.as_u8(), &value).unwrap(),
            Err(msg) => tx.write_tlv_str(Tag::ErrorMessage.as_u8(), &msg).unwrap(),
        }
        tx.seal_frame(FrameType::GetSetRpy.as_u16());
        if stream.write_all(tx.as_slice()).is_err() {
            return;
        }
    }
}
