//! Command model and wire encoding.
//!
//! Request wire format (line-oriented, CRLF-terminated):
//!
//! ```text
//! VERB arg1 arg2\r\n
//! ```
//!
//! Payload-bearing commands (SET, APPEND, GETSET and the serialized SET
//! variants) embed a length-prefixed sub-protocol, because a value may
//! itself contain the terminator:
//!
//! ```text
//! VERB key <payload_len>\r\n
//! <payload bytes>\r\n
//! ```

use crate::error::ProtocolError;
use crate::TERMINATOR;
use bytes::{BufMut, Bytes, BytesMut};

/// A single protocol command: a verb plus ordered arguments, with an
/// optional length-prefixed payload. Immutable once built.
#[derive(Debug, Clone)]
pub struct Command {
    verb: String,
    args: Vec<String>,
    payload: Option<Bytes>,
}

impl Command {
    /// Creates a command with no arguments.
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
            payload: None,
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Attaches a length-prefixed payload. The byte length is sent as the
    /// final argument of the command line.
    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Encodes the command into wire bytes.
    ///
    /// Arguments are joined with single spaces and are not escaped: a verb
    /// or argument containing the terminator is rejected rather than sent
    /// as a garbled frame. This is a protocol limitation, not an escaping
    /// mechanism. Payload bytes are exempt (that is what the length prefix
    /// is for).
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        for part in std::iter::once(&self.verb).chain(self.args.iter()) {
            if part.contains('\r') || part.contains('\n') {
                return Err(ProtocolError::EmbeddedTerminator);
            }
        }

        let payload_len = self.payload.as_ref().map_or(0, Bytes::len);
        let mut buf = BytesMut::with_capacity(
            self.verb.len() + self.args.iter().map(|a| a.len() + 1).sum::<usize>() + payload_len + 16,
        );

        buf.put_slice(self.verb.as_bytes());
        for arg in &self.args {
            buf.put_u8(b' ');
            buf.put_slice(arg.as_bytes());
        }

        match &self.payload {
            Some(payload) => {
                buf.put_u8(b' ');
                buf.put_slice(payload.len().to_string().as_bytes());
                buf.put_slice(TERMINATOR);
                buf.put_slice(payload);
                buf.put_slice(TERMINATOR);
            }
            None => buf.put_slice(TERMINATOR),
        }

        Ok(buf)
    }
}
