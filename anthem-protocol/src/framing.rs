//! Inbound line framing
//!
//! The receiver sends unframed ASCII lines. A line is complete only once its
//! terminator has arrived; a single socket read may carry several lines or
//! stop in the middle of one.
//!
//! Older models terminate lines with `\r` (sometimes followed by `\n`), the
//! x20 series and AVM 60 with `;`. All three are accepted.

/// Longest partial line kept while waiting for a terminator
pub const DEFAULT_MAX_LINE_LENGTH: usize = 256;

fn is_terminator(byte: u8) -> bool {
    matches!(byte, b'\r' | b'\n' | b';')
}

fn push_line(raw: &[u8], lines: &mut Vec<String>) {
    let text: String = raw
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| char::from(b))
        .collect();
    let text = text.trim();
    if !text.is_empty() {
        lines.push(text.to_string());
    }
}

/// Splits `buffer` into complete lines and the trailing partial bytes
///
/// Empty lines are skipped and non-ASCII bytes dropped.
pub fn decode(buffer: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut lines = Vec::new();
    let mut start = 0;

    for (index, &byte) in buffer.iter().enumerate() {
        if is_terminator(byte) {
            push_line(&buffer[start..index], &mut lines);
            start = index + 1;
        }
    }

    (lines, buffer[start..].to_vec())
}

/// Stateful framer that carries partial lines across reads
#[derive(Debug)]
pub struct LineDecoder {
    pending: Vec<u8>,
    max_line_length: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_length,
        }
    }

    /// Feeds raw bytes, returning every line completed by them
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let (lines, rest) = decode(&self.pending);
        self.pending = rest;

        if self.pending.len() > self.max_line_length {
            tracing::warn!(
                "Discarding {} bytes without line terminator",
                self.pending.len()
            );
            self.pending.clear();
        }

        lines
    }

    /// Bytes received after the last terminator
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Drops any carried-over partial line (used for each new socket)
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}
