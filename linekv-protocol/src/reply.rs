//! Typed replies and incremental decoding.
//!
//! Reply wire format, dispatched on the first byte of a CRLF-terminated
//! line:
//!
//! ```text
//! +OK\r\n                 status
//! -ERR wrong type\r\n     error
//! :42\r\n                 integer
//! $6\r\nfoobar\r\n        bulk (length-prefixed payload; $-1 = absent)
//! *2\r\n$1\r\na\r\n...    array of nested replies
//! ```
//!
//! The predecessor protocol also sent bulk length headers as a bare number
//! without the `$` sigil; both forms are accepted.

use crate::error::ProtocolError;
use crate::{MAX_ARRAY_LEN, MAX_BULK_SIZE};
use bytes::{Buf, Bytes, BytesMut};

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Single-line affirmative reply (`+...`), e.g. `+OK`.
    Status(String),
    /// Server-side rejection (`-...`), text with the type byte stripped.
    Error(String),
    /// Integer reply (`:...`).
    Integer(i64),
    /// Length-prefixed payload; `None` is the absent/nil sentinel,
    /// distinct from an empty payload.
    Bulk(Option<Bytes>),
    /// Ordered sequence of nested replies (multi-bulk).
    Array(Vec<Reply>),
}

impl Reply {
    /// Decodes one complete reply from the front of `buf`.
    ///
    /// Returns `Ok(Some(reply))` and consumes its bytes, or `Ok(None)` if
    /// the buffer does not yet hold a complete reply (nothing consumed).
    /// This is the strict path: malformed headers are errors, unlike the
    /// lenient [`crate::codec::legacy`] helpers.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        match parse(buf)? {
            Some((reply, consumed)) => {
                buf.advance(consumed);
                Ok(Some(reply))
            }
            None => Ok(None),
        }
    }

    /// Whether this is a `+` status reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Status(_))
    }

    /// Whether this is a `-` error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Short name of the reply variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Status(_) => "status",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::Bulk(_) => "bulk",
            Reply::Array(_) => "array",
        }
    }

    /// Human-readable text of an error reply, with the conventional
    /// fixed `ERR ` code prefix stripped when present.
    pub fn error_text(&self) -> Option<String> {
        match self {
            Reply::Error(text) => Some(
                text.strip_prefix("ERR ")
                    .map_or_else(|| text.clone(), str::to_string),
            ),
            _ => None,
        }
    }
}

/// Parses one reply starting at the front of `buf` without consuming.
/// Returns the reply and the number of bytes it occupies.
fn parse(buf: &[u8]) -> Result<Option<(Reply, usize)>, ProtocolError> {
    let Some((line, after)) = read_line(buf, 0) else {
        return Ok(None);
    };
    if line.is_empty() {
        return Err(ProtocolError::InvalidReplyByte(b'\n'));
    }

    match line[0] {
        b'+' => Ok(Some((Reply::Status(text(&line[1..])?), after))),
        b'-' => Ok(Some((Reply::Error(text(&line[1..])?), after))),
        b':' => Ok(Some((Reply::Integer(integer(&line[1..])?), after))),
        b'*' => parse_array(buf, &line[1..], after),
        b'$' => parse_bulk(buf, &line[1..], after),
        // Bare-number length header (no sigil) is a bulk reply.
        b'0'..=b'9' => parse_bulk(buf, line, after),
        other => Err(ProtocolError::InvalidReplyByte(other)),
    }
}

fn parse_bulk(
    buf: &[u8],
    header: &[u8],
    after: usize,
) -> Result<Option<(Reply, usize)>, ProtocolError> {
    let len = integer(header)?;
    if len < 0 {
        return Ok(Some((Reply::Bulk(None), after)));
    }

    let len = len as usize;
    if len > MAX_BULK_SIZE {
        return Err(ProtocolError::BulkTooLarge {
            size: len,
            max: MAX_BULK_SIZE,
        });
    }

    // Payload plus its trailing terminator.
    if buf.len() < after + len + 2 {
        return Ok(None);
    }
    if &buf[after + len..after + len + 2] != b"\r\n" {
        return Err(ProtocolError::InvalidLength(format!(
            "bulk payload of {len} bytes not followed by terminator"
        )));
    }

    let payload = Bytes::copy_from_slice(&buf[after..after + len]);
    Ok(Some((Reply::Bulk(Some(payload)), after + len + 2)))
}

fn parse_array(
    buf: &[u8],
    header: &[u8],
    after: usize,
) -> Result<Option<(Reply, usize)>, ProtocolError> {
    let count = integer(header)?;
    if count <= 0 {
        return Ok(Some((Reply::Array(Vec::new()), after)));
    }
    if count as usize > MAX_ARRAY_LEN {
        return Err(ProtocolError::InvalidLength(format!(
            "array count {count} exceeds maximum {MAX_ARRAY_LEN}"
        )));
    }

    let mut items = Vec::with_capacity(count as usize);
    let mut consumed = after;
    for _ in 0..count {
        match parse(&buf[consumed..])? {
            Some((item, n)) => {
                items.push(item);
                consumed += n;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((Reply::Array(items), consumed)))
}

/// Finds the next terminated line at `start`. Returns the line content
/// (terminator stripped) and the index just past the terminator. Lines are
/// delimited by `\n`; a preceding `\r` is stripped.
fn read_line(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let pos = buf[start..].iter().position(|&b| b == b'\n')? + start;
    let end = if pos > start && buf[pos - 1] == b'\r' {
        pos - 1
    } else {
        pos
    };
    Some((&buf[start..end], pos + 1))
}

fn text(bytes: &[u8]) -> Result<String, ProtocolError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| ProtocolError::InvalidUtf8)
}

fn integer(bytes: &[u8]) -> Result<i64, ProtocolError> {
    let s = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
    s.trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidLength(s.to_string()))
}
