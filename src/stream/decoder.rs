// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// Frame decoder
//
// Turns upstream byte chunks into logical lines, independent of where the
// transport happened to cut the stream. The carry-over buffer holds raw
// bytes: `\n` never appears inside a multi-byte UTF-8 sequence, so only
// complete lines are ever decoded and split characters are reassembled
// exactly.

use super::types::StreamError;

/// Incremental line splitter owning the unterminated upstream tail.
#[derive(Debug)]
pub struct FrameDecoder {
    /// Bytes received after the last `\n`.
    buffer: Vec<u8>,
    max_line_bytes: usize,
}

impl FrameDecoder {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_bytes,
        }
    }

    /// Append `chunk` and return every line it completed, in order.
    ///
    /// Line terminators (`\n`, and a `\r` before it) are not included.
    /// Completed lines are always returned; an oversized tail is reported
    /// separately by `check_tail`.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        // Only the new bytes can contain a terminator we have not seen.
        let mut search_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = self.buffer[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            lines.push(decode_line(&self.buffer[line_start..end]));
            line_start = end + 1;
            search_from = line_start;
        }
        self.buffer.drain(..line_start);
        lines
    }

    /// Fails once the unterminated tail exceeds the configured bound.
    pub fn check_tail(&self) -> Result<(), StreamError> {
        if self.buffer.len() > self.max_line_bytes {
            return Err(StreamError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        Ok(())
    }

    /// End of input: return the residual tail as a final line if non-empty.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = decode_line(&self.buffer);
        self.buffer.clear();
        Some(line)
    }

    /// Bytes currently held back waiting for a terminator.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
