//! # linekv-client
//!
//! Async client for the line-oriented key-value store protocol.
//!
//! This crate provides:
//! - A single-connection TCP client (persistent or per-call sockets)
//! - AUTH handshake and database selection tracking
//! - A typed method per server command over the shared protocol core
//!
//! One command is in flight at a time; there is no pipelining. Callers
//! needing concurrency use separate client instances, each owning its own
//! socket.

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig, ConnectionMode};
pub use error::ClientError;
