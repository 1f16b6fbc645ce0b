//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors produced by the strict decoder and the encoder.
///
/// The `legacy` codec helpers are lenient by contract and never return
/// these; only `Reply::decode` and `Encoder` do.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid reply type byte: {0:#04x}")]
    InvalidReplyByte(u8),

    #[error("invalid length header: {0:?}")]
    InvalidLength(String),

    #[error("bulk payload too large: {size} bytes (max {max})")]
    BulkTooLarge { size: usize, max: usize },

    #[error("invalid UTF-8 in reply line")]
    InvalidUtf8,

    #[error("command verb or argument contains the line terminator")]
    EmbeddedTerminator,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
