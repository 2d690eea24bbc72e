//! Streaming line framer
//!
//! GRBL replies are `\n`-terminated ASCII lines (usually `\r\n`). Serial
//! reads arrive in arbitrary chunks, so bytes are pushed into a
//! [`LineBuffer`] and complete lines are pulled out one at a time.
//!
//! Lines are returned exactly as received, terminator included. Callers
//! that want the bare payload use [`strip_line_ending`].

use tracing::warn;

/// Line terminator byte
const LINE_FEED: u8 = b'\n';

/// Longest line accepted before the buffer is force-split
const MAX_LINE_LEN: usize = 1024;

/// Streaming line framer
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(128),
        }
    }

    /// Push raw bytes into the buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete line, terminator included
    pub fn next_line(&mut self) -> Option<String> {
        if let Some(pos) = self.buffer.iter().position(|&b| b == LINE_FEED) {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            return Some(String::from_utf8_lossy(&line).into_owned());
        }

        if self.buffer.len() > MAX_LINE_LEN {
            warn!(
                "No line terminator in {} buffered bytes, splitting",
                self.buffer.len()
            );
            let line: Vec<u8> = self.buffer.drain(..MAX_LINE_LEN).collect();
            return Some(String::from_utf8_lossy(&line).into_owned());
        }

        None
    }

    /// Take whatever is buffered, complete line or not
    ///
    /// Used when a read times out mid-line: the partial data is handed to
    /// the caller the same way a timed-out serial `readline` would.
    pub fn take_partial(&mut self) -> String {
        let data = std::mem::take(&mut self.buffer);
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Number of bytes waiting in the buffer
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Strip trailing `\r` and `\n` characters from a received line
pub fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}
