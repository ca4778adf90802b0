//! Core error types shared by the whole workspace

use thiserror::Error;

/// Result type for core/protocol/net operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the rudp transport
///
/// There is no `OutOfMemory` variant: allocation failure aborts the
/// process rather than returning a recoverable error.
#[derive(Debug, Error)]
pub enum Error {
    /// Null peer, empty payload, `app_cmd` overflow, ack-of-unsent, malformed header.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Bind was attempted with no address configured.
    #[error("address required")]
    AddressRequired,

    /// Wraps the OS errno from socket/bind/recv/sendto.
    #[error("socket error: {0}")]
    SocketError(#[from] std::io::Error),

    /// Operation attempted on a peer that already reported `Dropped`.
    #[error("peer is dead")]
    PeerDead,
}
