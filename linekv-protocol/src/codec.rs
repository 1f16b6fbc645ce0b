//! Encoder and decoder for commands and replies.

use crate::command::Command;
use crate::error::ProtocolError;
use crate::reply::Reply;
use bytes::{Bytes, BytesMut};

/// Encodes commands into wire bytes.
pub struct Encoder;

impl Encoder {
    /// Encodes a command into its wire form.
    pub fn encode_command(command: &Command) -> Result<BytesMut, ProtocolError> {
        command.encode()
    }
}

/// Buffered, incremental reply decoder.
///
/// Feed raw socket bytes with [`extend`](Decoder::extend) and pull complete
/// replies with [`decode_reply`](Decoder::decode_reply). Completion is
/// driven by the protocol (declared bulk lengths, terminators, array
/// counts), never by whether the socket currently has unread bytes.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete reply from the buffer.
    pub fn decode_reply(&mut self) -> Result<Option<Reply>, ProtocolError> {
        Reply::decode(&mut self.buffer)
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lenient decode helpers matching the behavior of older clients, kept for
/// compatibility testing alongside the strict [`Reply`] path.
///
/// These never fail: malformed input degrades to `false` / `0` / empty
/// rather than an error. In particular [`decode_integer`](legacy::decode_integer)
/// cannot distinguish a genuine `:0` reply from a parse failure; new code
/// should use [`Reply::decode`], which reports malformed frames.
pub mod legacy {
    use super::*;

    /// True iff the frame is a `+` status line. Any `-...` (or anything
    /// else) is failure.
    pub fn decode_status(frame: &[u8]) -> bool {
        frame.first() == Some(&b'+')
    }

    /// Parses the integer after the leading type byte.
    ///
    /// Returns 0 on malformed input, never errors. A numeric prefix is
    /// honored (`:12abc` decodes to 12).
    pub fn decode_integer(frame: &[u8]) -> i64 {
        if frame.len() < 2 {
            return 0;
        }
        numeric_prefix(&frame[1..])
    }

    /// Strips the type byte from a status or error line: one byte for
    /// `+...` lines, the fixed 5-byte `-ERR ` error-code prefix otherwise.
    /// The trailing terminator, if present, is trimmed.
    pub fn decode_error_text(frame: &[u8]) -> String {
        let skip = if decode_status(frame) { 1 } else { 5 };
        let rest = frame.get(skip..).unwrap_or_default();
        String::from_utf8_lossy(rest)
            .trim_end_matches(['\r', '\n'])
            .to_string()
    }

    /// Splits a multi-line frame into (length header, payload) pairs.
    ///
    /// The leading segment (the reply's own count header) and the trailing
    /// empty segment produced by a terminal terminator are discarded; the
    /// remaining segments alternate per-item length header and payload. A
    /// negative length header marks an absent item and occupies only its
    /// header segment, so the following pairs do not shift.
    pub fn decode_bulk_pairs(frame: &[u8], terminator: &[u8]) -> Vec<(i64, Option<Bytes>)> {
        let mut segments = split_on(frame, terminator);
        if segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }

        let mut pairs = Vec::new();
        // Skip the count header at position 0.
        let mut idx = 1;
        while idx < segments.len() {
            let header = segments[idx];
            let len = numeric_prefix(strip_sigil(header));
            if len < 0 {
                pairs.push((len, None));
                idx += 1;
            } else {
                let payload = segments
                    .get(idx + 1)
                    .map(|s| Bytes::copy_from_slice(s));
                pairs.push((len, payload));
                idx += 2;
            }
        }
        pairs
    }

    fn strip_sigil(segment: &[u8]) -> &[u8] {
        match segment.first() {
            Some(&b'$') | Some(&b'*') | Some(&b':') => &segment[1..],
            _ => segment,
        }
    }

    fn split_on<'a>(frame: &'a [u8], terminator: &[u8]) -> Vec<&'a [u8]> {
        if terminator.is_empty() {
            return vec![frame];
        }
        let mut segments = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i + terminator.len() <= frame.len() {
            if &frame[i..i + terminator.len()] == terminator {
                segments.push(&frame[start..i]);
                i += terminator.len();
                start = i;
            } else {
                i += 1;
            }
        }
        segments.push(&frame[start..]);
        segments
    }

    /// Loose integer cast: optional sign plus leading digits, 0 when
    /// nothing numeric leads.
    fn numeric_prefix(bytes: &[u8]) -> i64 {
        let s = String::from_utf8_lossy(bytes);
        let s = s.trim();
        let b = s.as_bytes();
        let mut end = 0;
        if matches!(b.first(), Some(b'+') | Some(b'-')) {
            end = 1;
        }
        while end < b.len() && b[end].is_ascii_digit() {
            end += 1;
        }
        s[..end].parse().unwrap_or(0)
    }
}
