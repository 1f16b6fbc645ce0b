//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] linekv_protocol::ProtocolError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("read timeout")]
    Timeout,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("server error: {0}")]
    Command(String),

    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },
}

impl ClientError {
    /// Returns whether this error terminates usability of the connection.
    ///
    /// Connection-level failures are fatal and the client must be
    /// reconstructed (or reconnected); server-side command rejections are
    /// recoverable. Nothing is retried automatically either way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::NotConnected
                | ClientError::ConnectionClosed
                | ClientError::Timeout
                | ClientError::Auth(_)
        )
    }
}
