//! UDP and TCP socket wrappers
//!
//! Thin capability surface over the OS sockets: everything is IPv4, every
//! blocking call carries an explicit timeout, and a timeout on receive is
//! reported as "nothing yet" rather than an error.

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{
    Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream, ToSocketAddrs, UdpSocket,
};
use std::time::Duration;
use thiserror::Error;

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,

    #[error("Operation timed out")]
    Timeout,

    #[error("Connection closed by peer")]
    Closed,
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn to_v4(addr: SocketAddr) -> Result<SocketAddrV4, SocketError> {
    match addr {
        SocketAddr::V4(v4) => Ok(v4),
        SocketAddr::V6(_) => Err(SocketError::InvalidAddress),
    }
}

/// UDP socket
pub struct UdpSock {
    inner: UdpSocket,
}

impl UdpSock {
    /// Create a UDP socket bound to `addr`
    ///
    /// With `allow_reuse` other sockets may bind the same port.
    pub fn bind(addr: SocketAddrV4, allow_reuse: bool) -> Result<Self, SocketError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

        if allow_reuse {
            socket.set_reuse_address(true)?;
        }

        socket.bind(&SocketAddr::V4(addr).into())?;

        Ok(UdpSock {
            inner: socket.into(),
        })
    }

    /// Bind to an ephemeral port on all interfaces
    pub fn bind_any() -> Result<Self, SocketError> {
        Self::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0), false)
    }

    /// Allow sending to broadcast addresses
    pub fn set_broadcast(&self, enable: bool) -> Result<(), SocketError> {
        self.inner.set_broadcast(enable)?;
        Ok(())
    }

    /// Set the receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        SockRef::from(&self.inner).set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the receive buffer size
    pub fn recv_buffer_size(&self) -> Result<usize, SocketError> {
        Ok(SockRef::from(&self.inner).recv_buffer_size()?)
    }

    /// Set how long [`UdpSock::recv_from`] waits before reporting nothing
    pub fn set_recv_timeout(&self, timeout: Duration) -> Result<(), SocketError> {
        // A zero duration would mean "block forever"
        let timeout = timeout.max(Duration::from_millis(1));
        self.inner.set_read_timeout(Some(timeout))?;
        Ok(())
    }

    /// Join an IPv4 multicast group on `interface` (0.0.0.0 = default)
    pub fn join_multicast(&self, group: Ipv4Addr, interface: Ipv4Addr) -> Result<(), SocketError> {
        self.inner.join_multicast_v4(&group, &interface)?;
        Ok(())
    }

    pub fn leave_multicast(&self, group: Ipv4Addr, interface: Ipv4Addr) -> Result<(), SocketError> {
        self.inner.leave_multicast_v4(&group, &interface)?;
        Ok(())
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddrV4, SocketError> {
        to_v4(self.inner.local_addr()?)
    }

    /// Send a datagram to `target`
    pub fn send_to(&self, buf: &[u8], target: SocketAddrV4) -> Result<usize, SocketError> {
        Ok(self.inner.send_to(buf, SocketAddr::V4(target))?)
    }

    /// Receive one datagram
    ///
    /// Returns `Ok(None)` if the receive timeout elapsed with no data.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddrV4)>, SocketError> {
        match self.inner.recv_from(buf) {
            Ok((n, addr)) => Ok(Some((n, to_v4(addr)?))),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(SocketError::Io(e)),
        }
    }
}

/// TCP connection
pub struct TcpSock {
    inner: TcpStream,
}

impl TcpSock {
    /// Connect to `addr`, giving up after `timeout`
    pub fn connect(addr: SocketAddrV4, timeout: Duration) -> Result<Self, SocketError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;

        socket.connect_timeout(&SocketAddr::V4(addr).into(), timeout).map_err(|e| {
            if is_timeout(&e) {
                SocketError::Timeout
            } else {
                SocketError::Io(e)
            }
        })?;
        socket.set_nodelay(true)?;

        Ok(TcpSock {
            inner: socket.into(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddrV4, SocketError> {
        to_v4(self.inner.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<SocketAddrV4, SocketError> {
        to_v4(self.inner.peer_addr()?)
    }

    /// Send all of `data` within `timeout`
    pub fn send(&mut self, data: &[u8], timeout: Duration) -> Result<(), SocketError> {
        self.inner.set_write_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        self.inner.write_all(data).map_err(|e| {
            if is_timeout(&e) {
                SocketError::Timeout
            } else {
                SocketError::Io(e)
            }
        })
    }

    /// Receive whatever is available, waiting at most `timeout`
    ///
    /// A closed connection is an error, never a zero-length read.
    pub fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SocketError> {
        self.inner.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        match self.inner.read(buf) {
            Ok(0) if !buf.is_empty() => Err(SocketError::Closed),
            Ok(n) => Ok(n),
            Err(e) if is_timeout(&e) => Err(SocketError::Timeout),
            Err(e) => Err(SocketError::Io(e)),
        }
    }
}

/// Resolve a host name to its first IPv4 address
pub fn resolve_ipv4(host: &str) -> Option<Ipv4Addr> {
    (host, 0)
        .to_socket_addrs()
        .ok()?
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn loopback(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)
    }

    #[test]
    fn test_udp_bind() {
        let socket = UdpSock::bind(loopback(0), false).unwrap();
        let addr = socket.local_addr().unwrap();
        assert!(addr.port() > 0);
    }

    #[test]
    fn test_udp_recv_buffer_size() {
        let socket = UdpSock::bind_any().unwrap();
        socket.set_recv_buffer_size(262144).unwrap();
        // May not match exactly due to OS limits
        assert!(socket.recv_buffer_size().unwrap() > 0);
    }

    #[test]
    fn test_udp_send_recv() {
        let sender = UdpSock::bind(loopback(0), false).unwrap();
        let receiver = UdpSock::bind(loopback(0), false).unwrap();
        receiver.set_recv_timeout(Duration::from_millis(500)).unwrap();

        let data = b"Hello, tuner!";
        sender.send_to(data, receiver.local_addr().unwrap()).unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = receiver.recv_from(&mut buf).unwrap().expect("datagram");
        assert_eq!(&buf[..n], data);
        assert_eq!(from, sender.local_addr().unwrap());
    }

    #[test]
    fn test_udp_recv_timeout_is_not_error() {
        let socket = UdpSock::bind(loopback(0), false).unwrap();
        socket.set_recv_timeout(Duration::from_millis(10)).unwrap();
        let mut buf = [0u8; 16];
        assert!(socket.recv_from(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_udp_port_in_use() {
        let holder = UdpSock::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0), false).unwrap();
        let port = holder.local_addr().unwrap().port();
        assert!(UdpSock::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port), false).is_err());
    }

    #[test]
    fn test_tcp_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut client = TcpSock::connect(loopback(port), Duration::from_millis(500)).unwrap();
        client.send(b"ping", Duration::from_millis(500)).unwrap();

        let mut buf = [0u8; 4];
        let mut got = 0;
        while got < 4 {
            got += client.recv(&mut buf[got..], Duration::from_millis(500)).unwrap();
        }
        assert_eq!(&buf, b"ping");
        assert_eq!(client.peer_addr().unwrap().port(), port);

        server.join().unwrap();
        assert!(matches!(
            client.recv(&mut buf, Duration::from_millis(500)),
            Err(SocketError::Closed)
        ));
    }

    #[test]
    fn test_tcp_recv_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut client = TcpSock::connect(loopback(port), Duration::from_millis(500)).unwrap();
        let _accepted = listener.accept().unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(
            client.recv(&mut buf, Duration::from_millis(20)),
            Err(SocketError::Timeout)
        ));
    }

    #[test]
    fn test_resolve_localhost() {
        assert_eq!(resolve_ipv4("127.0.0.1"), Some(Ipv4Addr::LOCALHOST));
    }
}
