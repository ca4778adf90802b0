//! rudp-protocol: the per-peer reliable-UDP state machine
//!
//! This crate has no async-runtime dependency. Every state-machine
//! method takes `now: Instant` explicitly; the Tokio wiring that
//! supplies `now` and performs the actual socket I/O lives in
//! `rudp-net`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod command;
pub mod error;
pub mod header;
pub mod peer;
pub mod reassembly;
pub mod rto;
pub mod seq;

pub use command::Command;
pub use error::{ProtocolError, Result};
pub use header::{opt, PacketHeader, HEADER_SIZE, RECV_BUFFER_SIZE, USEFUL_SIZE, VERSION};
pub use peer::{LinkInfo, Peer, PeerEvent, PeerState, Role};
pub use rto::RtoEstimator;
