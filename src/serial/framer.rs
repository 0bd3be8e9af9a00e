//! Newline framer for text emitted by the provisioning board.
//!
//! The board prints newline-terminated text lines. Reads from the serial port return
//! arbitrary chunks, so this framer accumulates them and yields whole lines when available.
//! Lines are decoded lossily: invalid UTF-8 becomes U+FFFD, decoding never fails.
use bytes::{Buf, BytesMut};

/// Maximum buffered line length before a line is force-cut (guards against a board that
/// never sends a newline).
pub const MAX_LINE_BYTES: usize = 4096;

pub struct LineFramer {
    buf: BytesMut,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// `true` when a complete line (or an over-long run) is ready to be taken.
    pub fn has_line(&self) -> bool {
        self.buf.len() >= MAX_LINE_BYTES || self.buf.contains(&b'\n')
    }

    /// Extract the next complete line, without its terminator, decoded and trimmed.
    /// Returns `None` when no newline has arrived yet and the buffer is under the cap.
    pub fn next_line(&mut self) -> Option<String> {
        let end = match self.buf.iter().position(|&b| b == b'\n') {
            Some(pos) if pos < MAX_LINE_BYTES => pos,
            _ if self.buf.len() >= MAX_LINE_BYTES => {
                let raw = self.buf.split_to(self.cut_point());
                return Some(decode_line(&raw));
            }
            _ => return None,
        };
        let raw = self.buf.split_to(end);
        self.buf.advance(1); // newline
        Some(decode_line(&raw))
    }

    /// Cut position for an over-long run: `MAX_LINE_BYTES`, moved back so a multi-byte
    /// UTF-8 character is not split. Invalid data with no boundary nearby is cut at the cap.
    fn cut_point(&self) -> usize {
        let is_continuation = |at: usize| self.buf.get(at).map_or(false, |b| b & 0xC0 == 0x80);
        let mut cut = MAX_LINE_BYTES;
        while cut > MAX_LINE_BYTES - 3 && is_continuation(cut) {
            cut -= 1;
        }
        if is_continuation(cut) {
            MAX_LINE_BYTES
        } else {
            cut
        }
    }

    /// Drain whatever is buffered as one line. Used when a read times out mid-line.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let raw = self.buf.split();
        Some(decode_line(&raw))
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lossy UTF-8 decode followed by whitespace trim (also strips a trailing `\r`).
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}
