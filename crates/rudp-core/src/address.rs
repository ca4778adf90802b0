//! Peer address handling
//!
//! Thin wrapper over [`std::net::SocketAddr`]. The wrapper exists to carry
//! the "resolve by hostname with a family-selection mode" contract as a
//! constructor rather than as mutation of a pre-existing socket.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use crate::error::{Error, Result};

/// Address family selector used when resolving a hostname
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Only accept IPv4 results
    V4,
    /// Only accept IPv6 results
    V6,
    /// Accept either, preferring whatever `getaddrinfo` (via the std
    /// resolver) returns first
    Either,
}

/// A resolved peer address
///
/// Equality is delegated to `SocketAddr`, which already compares equal iff
/// family and address bytes (and port) match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(SocketAddr);

impl Address {
    /// Wrap an already-resolved socket address
    pub fn from_raw(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Resolve `host:port` under the given family constraint
    ///
    /// The first candidate matching `family` is returned. Fails with
    /// [`Error::InvalidArgument`] if resolution yields no match.
    pub fn resolve(host: &str, port: u16, family: Family) -> Result<Self> {
        let candidates = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::InvalidArgument(format!("resolving {host}:{port}: {e}")))?;

        for addr in candidates {
            let matches = match family {
                Family::V4 => addr.is_ipv4(),
                Family::V6 => addr.is_ipv6(),
                Family::Either => true,
            };
            if matches {
                return Ok(Self(addr));
            }
        }

        Err(Error::InvalidArgument(format!(
            "no {family:?} address found for {host}:{port}"
        )))
    }

    /// Construct from a literal IPv4 address and port
    pub fn from_ipv4(addr: Ipv4Addr, port: u16) -> Self {
        Self(SocketAddr::new(IpAddr::V4(addr), port))
    }

    /// Construct from a literal IPv6 address and port
    pub fn from_ipv6(addr: Ipv6Addr, port: u16) -> Self {
        Self(SocketAddr::new(IpAddr::V6(addr), port))
    }

    /// The underlying socket address
    pub fn as_socket_addr(&self) -> SocketAddr {
        self.0
    }

    /// Whether this address is IPv4
    pub fn is_ipv4(&self) -> bool {
        self.0.is_ipv4()
    }

    /// Whether this address is IPv6
    pub fn is_ipv6(&self) -> bool {
        self.0.is_ipv6()
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl From<Address> for SocketAddr {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_roundtrips() {
        let sock: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let addr = Address::from_raw(sock);
        assert_eq!(addr.as_socket_addr(), sock);
    }

    #[test]
    fn literal_v4_and_v6() {
        let v4 = Address::from_ipv4(Ipv4Addr::new(10, 0, 0, 1), 4000);
        assert!(v4.is_ipv4());
        let v6 = Address::from_ipv6(Ipv6Addr::LOCALHOST, 4000);
        assert!(v6.is_ipv6());
    }

    #[test]
    fn resolve_localhost_v4() {
        let addr = Address::resolve("localhost", 4000, Family::V4).unwrap();
        assert!(addr.is_ipv4());
    }

    #[test]
    fn equality_matches_socket_addr() {
        let a = Address::from_ipv4(Ipv4Addr::new(1, 2, 3, 4), 1);
        let b = Address::from_ipv4(Ipv4Addr::new(1, 2, 3, 4), 1);
        let c = Address::from_ipv4(Ipv4Addr::new(1, 2, 3, 4), 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
