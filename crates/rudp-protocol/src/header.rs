//! Fixed 14-byte wire header
//!
//! All multi-byte fields are big-endian. Layout: version, command, opt,
//! dummy, reliable, unreliable, reliable_ack, segment_index, segments_size.

use bytes::{Buf, BufMut, BytesMut};

use crate::command::Command;
use crate::error::{ProtocolError, Result};

/// Current wire protocol version
pub const VERSION: u8 = 1;

/// Size of the fixed header, in bytes
pub const HEADER_SIZE: usize = 14;

/// Maximum UDP payload this implementation will send or accept, header
/// included
pub const RECV_BUFFER_SIZE: usize = 1500;

/// Usable application bytes per datagram after the header
pub const USEFUL_SIZE: usize = RECV_BUFFER_SIZE - HEADER_SIZE;

/// `opt` bit flags
pub mod opt {
    /// Packet carries a reliable sequence number
    pub const RELIABLE: u8 = 1;
    /// Packet is a retransmission (for reliable packets: "has been sent
    /// at least once")
    pub const RETRANSMITTED: u8 = 2;
    /// `reliable_ack` field is valid
    pub const ACK: u8 = 4;
}

/// Decoded fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Command byte, raw (decode via [`Command::from_byte`])
    pub command: u8,
    /// `opt` bit flags, see [`opt`]
    pub opt: u8,
    /// Reliable sequence of this packet if `RELIABLE`, else the sender's
    /// last-sent reliable sequence (the current frame identifier)
    pub reliable: u16,
    /// Unreliable sequence within the current reliable frame
    pub unreliable: u16,
    /// Cumulative ack of the remote's reliable stream, valid iff `ACK`
    pub reliable_ack: u16,
    /// 0-based fragment index for a segmented application message
    pub segment_index: u16,
    /// Total fragment count (≥ 1)
    pub segments_size: u16,
}

impl PacketHeader {
    /// Whether the `RELIABLE` bit is set
    pub fn is_reliable(&self) -> bool {
        self.opt & opt::RELIABLE != 0
    }

    /// Whether the `RETRANSMITTED` bit is set
    pub fn is_retransmitted(&self) -> bool {
        self.opt & opt::RETRANSMITTED != 0
    }

    /// Whether the `ACK` bit is set
    pub fn has_ack(&self) -> bool {
        self.opt & opt::ACK != 0
    }

    /// Decode a header from the front of `data`
    ///
    /// Rejects a version mismatch or a non-zero `dummy` byte.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::PacketTooShort {
                expected: HEADER_SIZE,
                got: data.len(),
            });
        }

        let mut buf = data;
        let version = buf.get_u8();
        if version != VERSION {
            return Err(ProtocolError::MalformedHeader(format!(
                "unsupported version {version}"
            )));
        }
        let command = buf.get_u8();
        let opt = buf.get_u8();
        let dummy = buf.get_u8();
        if dummy != 0 {
            return Err(ProtocolError::MalformedHeader("dummy byte not zero".into()));
        }
        let reliable = buf.get_u16();
        let unreliable = buf.get_u16();
        let reliable_ack = buf.get_u16();
        let segment_index = buf.get_u16();
        let segments_size = buf.get_u16();

        Ok(Self {
            command,
            opt,
            reliable,
            unreliable,
            reliable_ack,
            segment_index,
            segments_size,
        })
    }

    /// Encode the header into `buf`
    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(VERSION);
        buf.put_u8(self.command);
        buf.put_u8(self.opt);
        buf.put_u8(0); // dummy
        buf.put_u16(self.reliable);
        buf.put_u16(self.unreliable);
        buf.put_u16(self.reliable_ack);
        buf.put_u16(self.segment_index);
        buf.put_u16(self.segments_size);
    }

    /// Decode the `command` byte into a [`Command`]
    pub fn command(&self) -> Command {
        Command::from_byte(self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PacketHeader {
        PacketHeader {
            command: Command::App(3).to_byte().unwrap(),
            opt: opt::RELIABLE | opt::ACK,
            reliable: 42,
            unreliable: 0,
            reliable_ack: 41,
            segment_index: 0,
            segments_size: 1,
        }
    }

    #[test]
    fn roundtrip() {
        let header = sample();
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.write(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let parsed = PacketHeader::parse(&buf).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.command(), Command::App(3));
        assert!(parsed.is_reliable());
        assert!(parsed.has_ack());
        assert!(!parsed.is_retransmitted());
    }

    #[test]
    fn rejects_short_buffer() {
        let err = PacketHeader::parse(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ProtocolError::PacketTooShort { .. }));
    }

    #[test]
    fn rejects_bad_version() {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        sample().write(&mut buf);
        buf[0] = 2;
        let err = PacketHeader::parse(&buf).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedHeader(_)));
    }

    #[test]
    fn rejects_nonzero_dummy() {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        sample().write(&mut buf);
        buf[3] = 1;
        let err = PacketHeader::parse(&buf).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedHeader(_)));
    }
}
