//! Incremental line splitting for raw process output.
//!
//! Backends can emit non-UTF8 bytes and split lines across reads. Lines are
//! assembled from byte chunks and decoded lossily so a stray byte never ends
//! output capture.

/// Longest line kept before it is flushed without a newline.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Accumulates output chunks and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the lines it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(self.take_line());
            rest = &rest[pos + 1..];
        }

        self.pending.extend_from_slice(rest);
        if self.pending.len() >= MAX_LINE_BYTES {
            lines.push(self.take_line());
        }
        lines
    }

    /// Flush a trailing line that never got its newline (end of stream).
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    fn take_line(&mut self) -> String {
        if self.pending.last() == Some(&b'\r') {
            self.pending.pop();
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}
