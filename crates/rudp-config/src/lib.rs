//! Optional TOML configuration for the `rudp-cli` reference binaries
//!
//! Library crates (`rudp-core`, `rudp-protocol`, `rudp-net`) take all
//! configuration as explicit constructor arguments; this crate exists
//! only so the reference binaries can read a config file and let CLI
//! flags override it, following the same file-then-flags layering as
//! the rest of this workspace's lineage.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

use std::path::Path;
use std::time::Duration;

use rudp_core::Timeouts;
use serde::Deserialize;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("reading {path}: {source}")]
    Io {
        /// Path that failed to read
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The config file's TOML was malformed
    #[error("parsing {path}: {source}")]
    Parse {
        /// Path that failed to parse
        path: String,
        /// Underlying TOML error
        source: toml::de::Error,
    },
}

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Timeout settings as they appear in the TOML file, in milliseconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Lower RTO clamp, milliseconds
    pub min_rto_ms: u64,
    /// Upper RTO clamp, milliseconds
    pub max_rto_ms: u64,
    /// Idle time before a keepalive PING, milliseconds
    pub action_ms: u64,
    /// Silence duration before a peer is dropped, milliseconds
    pub drop_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        let t = Timeouts::default();
        Self {
            min_rto_ms: t.min_rto.as_millis() as u64,
            max_rto_ms: t.max_rto.as_millis() as u64,
            action_ms: t.action.as_millis() as u64,
            drop_ms: t.drop.as_millis() as u64,
        }
    }
}

impl From<TimeoutsConfig> for Timeouts {
    fn from(c: TimeoutsConfig) -> Self {
        Timeouts {
            min_rto: Duration::from_millis(c.min_rto_ms),
            max_rto: Duration::from_millis(c.max_rto_ms),
            action: Duration::from_millis(c.action_ms),
            drop: Duration::from_millis(c.drop_ms),
        }
    }
}

/// Top-level config file shape for `test-server`/`test-client`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bind address for `test-server` (`host:port`)
    pub bind: String,
    /// Remote address for `test-client` (`host:port`)
    pub connect: String,
    /// Per-peer timeouts
    pub timeouts: TimeoutsConfig,
    /// Enable verbose (`trace`-level) logging
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:4242".to_string(),
            connect: "127.0.0.1:4242".to_string(),
            timeouts: TimeoutsConfig::default(),
            verbose: false,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, falling back to defaults for any field it
    /// omits
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_core_timeouts() {
        let cfg = AppConfig::default();
        let timeouts: Timeouts = cfg.timeouts.into();
        assert_eq!(timeouts, Timeouts::default());
    }

    #[test]
    fn loads_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind = \"0.0.0.0:9000\"\nverbose = true").unwrap();
        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:9000");
        assert!(cfg.verbose);
        assert_eq!(cfg.connect, "127.0.0.1:4242");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AppConfig::load(Path::new("/nonexistent/rudp.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
