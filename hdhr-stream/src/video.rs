//! Background video receiver
//!
//! [`VideoSocket`] binds a UDP port, spawns a receive thread that feeds
//! datagrams into a [`RingBuffer`], and exposes the buffer to the caller.
//! After construction nothing here returns an error; anomalies show up
//! as counters in [`VideoStats`].

use crate::ring::{RingBuffer, VideoStats};
use bytes::Bytes;
use hdhr_io::{Logger, SocketError, UdpSock};
use hdhr_protocol::rtp::{RtpHeader, RTP_HEADER_SIZE};
use hdhr_protocol::types::{
    VIDEO_DATA_BUFFER_SIZE_1S, VIDEO_DATA_PACKET_SIZE, VIDEO_RTP_DATA_PACKET_SIZE,
};
use parking_lot::Mutex;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Video receiver errors (construction only)
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Failed to start receive thread: {0}")]
    Thread(io::Error),
}

/// Video receiver configuration
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// UDP port to listen on (0 = pick one)
    pub listen_port: u16,
    /// Allow other sockets to share the port
    pub allow_port_reuse: bool,
    /// Ring buffer size in bytes
    pub buffer_size: usize,
    /// Kernel receive buffer size
    pub socket_rcvbuf: usize,
    /// Receive poll interval; bounds how long shutdown takes
    pub recv_timeout: Duration,
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            listen_port: 0,
            allow_port_reuse: false,
            buffer_size: VIDEO_DATA_BUFFER_SIZE_1S,
            socket_rcvbuf: 1024 * 1024,
            recv_timeout: Duration::from_millis(25),
        }
    }
}

struct Shared {
    ring: Mutex<RingBuffer>,
    stop: AtomicBool,
}

/// UDP video receiver with its own thread
pub struct VideoSocket {
    shared: Arc<Shared>,
    socket: Arc<UdpSock>,
    local_port: u16,
    thread: Option<JoinHandle<()>>,
    logger: Logger,
}

impl VideoSocket {
    /// Bind the socket and start receiving
    pub fn create(config: VideoConfig, logger: Logger) -> Result<Self, VideoError> {
        let logger = logger.with_prefix("video");

        let socket = UdpSock::bind(
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.listen_port),
            config.allow_port_reuse,
        )
        .map_err(|e| {
            logger.error(format_args!(
                "failed to bind port {}: {}",
                config.listen_port, e
            ));
            e
        })?;

        // The OS may clamp this; not fatal
        if let Err(e) = socket.set_recv_buffer_size(config.socket_rcvbuf) {
            logger.warn(format_args!("failed to set receive buffer size: {}", e));
        }
        socket.set_recv_timeout(config.recv_timeout)?;

        let local_port = socket.local_addr()?.port();
        let socket = Arc::new(socket);

        let shared = Arc::new(Shared {
            ring: Mutex::new(RingBuffer::new(config.buffer_size)),
            stop: AtomicBool::new(false),
        });

        let thread = {
            let shared = Arc::clone(&shared);
            let socket = Arc::clone(&socket);
            let logger = logger.clone();
            let poll = config.recv_timeout;
            thread::Builder::new()
                .name(format!("hdhr-video-{}", local_port))
                .spawn(move || receive_loop(&shared, &socket, &logger, poll))
                .map_err(VideoError::Thread)?
        };

        logger.debug(format_args!(
            "listening on port {} ({} byte buffer)",
            local_port,
            shared.ring.lock().capacity()
        ));

        Ok(VideoSocket {
            shared,
            socket,
            local_port,
            thread: Some(thread),
            logger,
        })
    }

    /// Port the stream should be sent to
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn join_multicast_group(
        &self,
        group: Ipv4Addr,
        interface: Ipv4Addr,
    ) -> Result<(), SocketError> {
        self.socket.join_multicast(group, interface).map_err(|e| {
            self.logger
                .error(format_args!("failed to join multicast group {}: {}", group, e));
            e
        })
    }

    pub fn leave_multicast_group(
        &self,
        group: Ipv4Addr,
        interface: Ipv4Addr,
    ) -> Result<(), SocketError> {
        self.socket.leave_multicast(group, interface)
    }

    /// Take up to `max_size` bytes of stream; empty if none is buffered
    pub fn recv(&self, max_size: usize) -> Bytes {
        self.shared.ring.lock().recv(max_size)
    }

    /// Discard buffered data and reset all counters
    pub fn flush(&self) {
        self.shared.ring.lock().flush();
    }

    pub fn stats(&self) -> VideoStats {
        self.shared.ring.lock().stats()
    }

    /// Log all counters on one line
    pub fn log_stats(&self) {
        let stats = self.stats();
        self.logger.info(format_args!("{}", stats));
    }
}

impl Drop for VideoSocket {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                self.logger.error(format_args!("receive thread panicked"));
            }
        }
    }
}

/// Log a failed receive and wait one poll interval before the next try
fn receive_failed(logger: &Logger, error: &SocketError, poll: Duration) {
    logger.debug(format_args!("receive error: {}", error));
    thread::sleep(poll);
}

fn receive_loop(shared: &Shared, socket: &UdpSock, logger: &Logger, poll: Duration) {
    let mut datagram = [0u8; VIDEO_RTP_DATA_PACKET_SIZE];

    while !shared.stop.load(Ordering::Acquire) {
        let length = match socket.recv_from(&mut datagram) {
            Ok(Some((length, _))) => length,
            Ok(None) => continue,
            Err(e) => {
                receive_failed(logger, &e, poll);
                continue;
            }
        };

        let mut ring = shared.ring.lock();

        let payload = if length == VIDEO_RTP_DATA_PACKET_SIZE {
            if let Ok(header) = RtpHeader::from_bytes(&datagram[..length]) {
                ring.observe_rtp(header.sequence);
            }
            &datagram[RTP_HEADER_SIZE..length]
        } else {
            &datagram[..length]
        };

        if payload.len() != VIDEO_DATA_PACKET_SIZE {
            continue;
        }

        ring.push_batch(payload);
    }
}
