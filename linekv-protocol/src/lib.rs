//! # linekv-protocol
//!
//! Wire protocol for linekv, a client for the line-oriented key-value store
//! protocol (the simplified predecessor of RESP).
//!
//! This crate provides:
//! - Command encoding (inline and length-prefixed payload forms)
//! - Incremental reply decoding into typed `Reply` values
//! - A `legacy` codec matching the lenient decode behavior of older
//!   clients, for compatibility testing
//!
//! No I/O happens here; the client crate owns the socket.

pub mod codec;
pub mod command;
pub mod error;
pub mod reply;

pub use codec::{Decoder, Encoder};
pub use command::Command;
pub use error::ProtocolError;
pub use reply::Reply;

/// Default port for the key-value server.
pub const DEFAULT_PORT: u16 = 6379;

/// Canonical line terminator.
///
/// Historical clients mixed `\n\n`, bare `\n` and `\r\n` between call sites;
/// the protocol terminator is CRLF and this implementation uses it
/// everywhere, including the inner terminator of payload-bearing commands.
pub const TERMINATOR: &[u8] = b"\r\n";

/// Maximum accepted bulk payload length (512 MiB).
///
/// A declared length above this is treated as a malformed frame rather than
/// an allocation request.
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum accepted multi-bulk element count.
///
/// Same rationale as [`MAX_BULK_SIZE`]: a declared count above this is a
/// malformed frame, not a reservation to honor.
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;
