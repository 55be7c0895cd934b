//! Local IPv4 interface enumeration
//!
//! Discovery needs one socket per local subnet so that broadcasts leave
//! through every interface. Only interfaces that are up and running are
//! reported; loopback and point-to-point links are skipped.

use crate::socket::SocketError;
use std::net::Ipv4Addr;

/// An IPv4 address assigned to a local interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalInterface {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl LocalInterface {
    pub fn new(ip: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        LocalInterface { ip, netmask }
    }

    /// Subnet-directed broadcast address
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.ip) | !u32::from(self.netmask))
    }

    /// True if `ip` is on this interface's subnet
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = u32::from(self.netmask);
        (u32::from(ip) & mask) == (u32::from(self.ip) & mask)
    }
}

/// Enumerate local IPv4 interfaces
#[cfg(unix)]
pub fn local_ipv4_interfaces() -> Result<Vec<LocalInterface>, SocketError> {
    use nix::net::if_::InterfaceFlags;
    use std::net::SocketAddrV4;

    let addrs = nix::ifaddrs::getifaddrs().map_err(|e| SocketError::Io(e.into()))?;
    let mut result = Vec::new();

    for ifa in addrs {
        let flags = ifa.flags
            & (InterfaceFlags::IFF_LOOPBACK
                | InterfaceFlags::IFF_POINTOPOINT
                | InterfaceFlags::IFF_UP
                | InterfaceFlags::IFF_RUNNING);
        if flags != (InterfaceFlags::IFF_UP | InterfaceFlags::IFF_RUNNING) {
            continue;
        }

        let ip = match ifa.address.as_ref().and_then(|a| a.as_sockaddr_in()) {
            Some(sin) => *SocketAddrV4::from(*sin).ip(),
            None => continue,
        };
        let netmask = match ifa.netmask.as_ref().and_then(|a| a.as_sockaddr_in()) {
            Some(sin) => *SocketAddrV4::from(*sin).ip(),
            None => continue,
        };

        let iface = LocalInterface::new(ip, netmask);
        if !result.contains(&iface) {
            result.push(iface);
        }
    }

    Ok(result)
}

/// Enumerate local IPv4 interfaces
///
/// Not available on this platform; discovery falls back to the routed socket.
#[cfg(not(unix))]
pub fn local_ipv4_interfaces() -> Result<Vec<LocalInterface>, SocketError> {
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_address() {
        let iface = LocalInterface::new(
            Ipv4Addr::new(192, 168, 1, 20),
            Ipv4Addr::new(255, 255, 255, 0),
        );
        assert_eq!(iface.broadcast(), Ipv4Addr::new(192, 168, 1, 255));

        let wide = LocalInterface::new(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 0, 0, 0));
        assert_eq!(wide.broadcast(), Ipv4Addr::new(10, 255, 255, 255));
    }

    #[test]
    fn test_subnet_membership() {
        let iface = LocalInterface::new(
            Ipv4Addr::new(192, 168, 1, 20),
            Ipv4Addr::new(255, 255, 255, 0),
        );
        assert!(iface.contains(Ipv4Addr::new(192, 168, 1, 200)));
        assert!(!iface.contains(Ipv4Addr::new(192, 168, 2, 1)));
    }

    #[test]
    fn test_enumeration_skips_loopback() {
        let ifaces = local_ipv4_interfaces().unwrap();
        assert!(ifaces.iter().all(|i| !i.ip.is_loopback()));
    }
}
