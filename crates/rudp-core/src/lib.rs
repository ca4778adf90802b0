//! rudp-core: shared types for the rudp reliable-UDP transport
//!
//! This crate provides the fundamental building blocks used by both
//! `rudp-protocol` (the per-peer reliability state machine) and `rudp-net`
//! (the Tokio-backed endpoint/client/server): address handling, the error
//! taxonomy, and the base context carrying default timeouts.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod address;
pub mod base;
pub mod error;

pub use address::{Address, Family};
pub use base::{BaseContext, LogLevel, Timeouts};
pub use error::{Error, Result};
