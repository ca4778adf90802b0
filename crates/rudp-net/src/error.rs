//! Errors surfaced by the endpoint/client/server layer

use thiserror::Error;

/// Result type for `rudp-net` operations
pub type Result<T> = std::result::Result<T, NetError>;

/// Errors raised while binding sockets or driving a `Client`/`Server`
#[derive(Debug, Error)]
pub enum NetError {
    /// Propagated from `rudp-core` (address resolution, socket setup)
    #[error(transparent)]
    Core(#[from] rudp_core::Error),

    /// Propagated from the peer state machine
    #[error(transparent)]
    Protocol(#[from] rudp_protocol::ProtocolError),

    /// Raw OS error from a socket call not already wrapped by `rudp-core`
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
