//! A bound UDP socket
//!
//! "Registers a persistent read-readiness callback with the event loop"
//! is realized here by the socket being pollable through Tokio's
//! reactor directly: callers drive readiness by `.await`ing [`Endpoint::recv`].

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

use rudp_core::{Address, Error as CoreError};
use rudp_protocol::RECV_BUFFER_SIZE;

use crate::error::Result;

/// A bound UDP socket
pub struct Endpoint {
    socket: UdpSocket,
}

impl Endpoint {
    /// Bind to `addr`, or to an unspecified IPv6 any-address with an
    /// ephemeral port when `addr` is `None`
    pub async fn bind(addr: Option<Address>) -> Result<Self> {
        let bind_addr = addr
            .map(|a| a.as_socket_addr())
            .unwrap_or_else(|| SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0));

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(CoreError::SocketError)?;

        Ok(Self { socket })
    }

    /// Bind an any-address socket matching the family of `remote`
    pub async fn bind_for(remote: SocketAddr) -> Result<Self> {
        let any = if remote.is_ipv4() {
            SocketAddr::new(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        };
        let socket = UdpSocket::bind(any).await.map_err(CoreError::SocketError)?;
        Ok(Self { socket })
    }

    /// Read one datagram into `buf`, returning its length and sender
    pub async fn recv(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Send one datagram to `addr`
    pub async fn send_to(&self, addr: SocketAddr, buf: &[u8]) -> std::io::Result<usize> {
        self.socket.send_to(buf, addr).await
    }

    /// The locally bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Drop the socket, cancelling any pending reactor registration
    pub fn close(self) {
        drop(self);
    }
}

/// Fixed receive buffer size; never exceeds what a single UDP payload
/// can hold
pub const RECV_BUF: usize = RECV_BUFFER_SIZE;
