//! Frame splitting over an append-only text buffer.

/// Longest delimiter (`\r\n\r\n`) minus one: how far back a rescan must start
/// to catch a delimiter that straddles two chunks.
const DELIMITER_LOOKBACK: usize = 3;

/// Splits an arbitrarily chunked stream into blank-line delimited frames.
///
/// Both `\n\n` and `\r\n\r\n` terminate a frame; whichever occurs first in
/// the buffer wins, so mixed conventions in one stream are fine. The text
/// after the last delimiter stays buffered until more input arrives, which
/// makes the output independent of how the input was chunked.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: String,
    scanned: usize,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame it completed, in order.
    /// Frames with only whitespace are skipped.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut from = self.scanned.saturating_sub(DELIMITER_LOOKBACK);
        while let Some((at, len)) = find_delimiter(self.buffer.as_bytes(), from) {
            let frame = &self.buffer[consumed..at];
            if !frame.trim().is_empty() {
                frames.push(frame.to_owned());
            }
            consumed = at + len;
            from = consumed;
        }

        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();
        frames
    }

    /// Text received after the last delimiter.
    pub fn residual(&self) -> &str {
        &self.buffer
    }

    /// Flush the residual tail at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buffer);
        (!rest.trim().is_empty()).then_some(rest)
    }
}

/// Leftmost delimiter at or after `from`, as `(offset, length)`.
fn find_delimiter(bytes: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..bytes.len()).find_map(|at| {
        let rest = &bytes[at..];
        if rest.starts_with(b"\n\n") {
            Some((at, 2))
        } else if rest.starts_with(b"\r\n\r\n") {
            Some((at, 4))
        } else {
            None
        }
    })
}
