//! Recent backend output, kept for a "backend logs" view.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// A single line of backend output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendLogEntry {
    pub timestamp: DateTime<Utc>,
    pub stream: OutputStream,
    pub line: String,
}

/// Ring buffer of the most recent output lines.
#[derive(Debug)]
pub struct BackendLogBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<BackendLogEntry>>,
}

impl BackendLogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a line, dropping the oldest one at capacity.
    pub fn push(&self, stream: OutputStream, line: impl Into<String>) {
        let entry = BackendLogEntry {
            timestamp: Utc::now(),
            stream,
            line: line.into(),
        };
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(entry);
    }

    /// Up to `limit` most recent lines, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<BackendLogEntry> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = lines.len().saturating_sub(limit);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let buffer = BackendLogBuffer::new(2);
        buffer.push(OutputStream::Stdout, "one");
        buffer.push(OutputStream::Stderr, "two");
        buffer.push(OutputStream::Stdout, "three");

        let lines: Vec<String> = buffer.recent(10).into_iter().map(|e| e.line).collect();
        assert_eq!(lines, vec!["two", "three"]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_recent_limit_keeps_newest() {
        let buffer = BackendLogBuffer::new(10);
        for i in 0..5 {
            buffer.push(OutputStream::Stdout, format!("line {i}"));
        }
        let recent = buffer.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].line, "line 3");
        assert_eq!(recent[1].line, "line 4");
    }

    #[test]
    fn test_clear() {
        let buffer = BackendLogBuffer::new(0);
        buffer.push(OutputStream::Stderr, "boom");
        assert!(!buffer.is_empty());
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
