//! Protocol-level error types

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding or driving the peer state machine
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Header fails to parse: wrong version, truncated, or `dummy` non-zero
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Datagram shorter than the fixed header
    #[error("packet too short: expected at least {expected}, got {got}")]
    PacketTooShort {
        /// Minimum size required
        expected: usize,
        /// Actual size received
        got: usize,
    },

    /// `app_cmd` would overflow the command byte, or payload is empty
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A received cumulative ack referenced a reliable sequence never sent
    #[error("broken ack: {0}")]
    BrokenAck(String),

    /// Core error propagated from `rudp-core` (address/socket/etc.)
    #[error(transparent)]
    Core(#[from] rudp_core::Error),
}
