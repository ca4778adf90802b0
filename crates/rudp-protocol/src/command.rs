//! Protocol command byte
//!
//! Commands 0-5 are reserved for transport bookkeeping; 6-255 carry an
//! application command `n = byte - 6` in `[0, 249]`.

use crate::error::{ProtocolError, Result};

/// A decoded command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// No payload, carries only sequencing/ack bookkeeping
    Noop,
    /// Connection request (client → server)
    ConnReq,
    /// Connection response (server → client)
    ConnRsp,
    /// Keepalive request, payload is an 8-byte timestamp
    Ping,
    /// Keepalive reply, echoes the PING payload
    Pong,
    /// Peer teardown notification
    Close,
    /// Application-level command, `n` in `[0, 249]`
    App(u8),
}

impl Command {
    /// First command byte reserved for application use
    pub const APP_BASE: u8 = 6;

    /// Highest application command index representable in one byte
    pub const APP_MAX: u8 = 249;

    /// Decode the wire command byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Command::Noop,
            1 => Command::ConnReq,
            2 => Command::ConnRsp,
            3 => Command::Ping,
            4 => Command::Pong,
            5 => Command::Close,
            n => Command::App(n - Self::APP_BASE),
        }
    }

    /// Encode to the wire command byte
    ///
    /// Fails if an `App` command would overflow the single byte.
    pub fn to_byte(self) -> Result<u8> {
        match self {
            Command::Noop => Ok(0),
            Command::ConnReq => Ok(1),
            Command::ConnRsp => Ok(2),
            Command::Ping => Ok(3),
            Command::Pong => Ok(4),
            Command::Close => Ok(5),
            Command::App(n) => {
                if n as usize + Self::APP_BASE as usize > u8::MAX as usize {
                    return Err(ProtocolError::InvalidArgument(format!(
                        "app command {n} overflows the command byte"
                    )));
                }
                Ok(Self::APP_BASE + n)
            }
        }
    }

    /// Build an `App` command, validating `n` fits the wire byte
    pub fn app(n: u8) -> Result<Self> {
        if n > Self::APP_MAX {
            return Err(ProtocolError::InvalidArgument(format!(
                "app command {n} exceeds max {}",
                Self::APP_MAX
            )));
        }
        Ok(Command::App(n))
    }

    /// Diagnostic name, used in log output
    pub fn name(&self) -> &'static str {
        match self {
            Command::Noop => "NOOP",
            Command::ConnReq => "CONN_REQ",
            Command::ConnRsp => "CONN_RSP",
            Command::Ping => "PING",
            Command::Pong => "PONG",
            Command::Close => "CLOSE",
            Command::App(_) => "APP",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::App(n) => write!(f, "APP({n})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_reserved_commands() {
        for cmd in [
            Command::Noop,
            Command::ConnReq,
            Command::ConnRsp,
            Command::Ping,
            Command::Pong,
            Command::Close,
        ] {
            let byte = cmd.to_byte().unwrap();
            assert_eq!(Command::from_byte(byte), cmd);
        }
    }

    #[test]
    fn roundtrip_app_command() {
        let cmd = Command::app(5).unwrap();
        let byte = cmd.to_byte().unwrap();
        assert_eq!(byte, 11);
        assert_eq!(Command::from_byte(byte), Command::App(5));
    }

    #[test]
    fn app_command_overflow_rejected() {
        assert!(Command::app(250).is_err());
    }
}
