//! Tokio-backed endpoint, client, and server for the reliable-UDP transport
//!
//! Wires [`rudp_protocol::Peer`] to real sockets: one Tokio task per
//! [`Client`]/[`Server`], `tokio::select!` over socket-recv and the
//! peer's next service deadline, no internal concurrency.

pub mod client;
pub mod endpoint;
pub mod error;
pub mod server;

pub use client::{Client, ClientHandler};
pub use endpoint::Endpoint;
pub use error::{NetError, Result};
pub use rudp_protocol::LinkInfo;
pub use server::{Server, ServerHandler};
