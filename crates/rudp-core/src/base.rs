//! Base context shared by every peer and endpoint: default timeouts and
//! the log-level mapping onto `tracing`.
//!
//! The original C library threaded a `rudp_handler` of function pointers
//! (`log`, `mem_alloc`, `mem_free`) through every call. Logging is
//! replaced here by `tracing` events emitted directly at the call site;
//! allocation hooks have no counterpart (see [`crate::error`]).

use std::time::Duration;

/// Severity levels mirroring the original library's logging hook
///
/// Mapped onto `tracing` levels: `Io → trace`, `Debug → debug`,
/// `Info → info`, `Warn → warn`, `Error → error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Per-datagram wire traffic, very verbose
    Io,
    /// State-machine transitions
    Debug,
    /// Connection lifecycle events
    Info,
    /// Recoverable anomalies (retransmits, unexpected commands)
    Warn,
    /// Unrecoverable per-peer failures
    Error,
}

impl LogLevel {
    /// The `tracing::Level` this maps onto
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Io => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Per-peer timing parameters
///
/// Defaults per the reference implementation: `min_rto = 200ms`,
/// `max_rto = 1000ms`, `action = 100ms` (idle time before a keepalive
/// PING), `drop = 10000ms` (absolute silence before the peer is
/// considered dead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Lower clamp for the RTO estimator
    pub min_rto: Duration,
    /// Upper clamp for the RTO estimator
    pub max_rto: Duration,
    /// Idle time before a keepalive PING is sent
    pub action: Duration,
    /// Silence duration after which a peer is dropped
    pub drop: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            min_rto: Duration::from_millis(200),
            max_rto: Duration::from_millis(1000),
            action: Duration::from_millis(100),
            drop: Duration::from_millis(10_000),
        }
    }
}

/// Shared context every `Peer` and `Endpoint` is constructed from
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseContext {
    /// Timeouts new peers inherit unless overridden
    pub default_timeouts: Timeouts,
}

impl BaseContext {
    /// Construct a context with the given default timeouts
    pub fn new(default_timeouts: Timeouts) -> Self {
        Self { default_timeouts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_match_reference_values() {
        let t = Timeouts::default();
        assert_eq!(t.min_rto, Duration::from_millis(200));
        assert_eq!(t.max_rto, Duration::from_millis(1000));
        assert_eq!(t.action, Duration::from_millis(100));
        assert_eq!(t.drop, Duration::from_millis(10_000));
    }

    #[test]
    fn log_level_ordering() {
        assert!(LogLevel::Io < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
