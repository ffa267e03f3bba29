//! Mock radio and serial sink for integration tests.
//!
//! Records every transmitted frame and every emitted serial line so tests
//! can assert on the full history, and lets tests shuttle frames between
//! a station and a node by hand — including dropping them, to play the
//! unreliable air.

use fieldlink::serial::LineSink;
use fieldlink::transport::RadioTransport;

// ── Recording radio ──────────────────────────────────────────

/// Radio that appends every frame to a log.
pub struct QueueRadio {
    pub sent: Vec<Vec<u8>>,
}

#[allow(dead_code)]
impl QueueRadio {
    pub fn new() -> Self {
        Self { sent: Vec::new() }
    }

    /// Remove and return the oldest transmitted frame.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        if self.sent.is_empty() {
            None
        } else {
            Some(self.sent.remove(0))
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }
}

impl RadioTransport for QueueRadio {
    type Error = ();

    fn send(&mut self, frame: &[u8]) -> Result<(), ()> {
        self.sent.push(frame.to_vec());
        Ok(())
    }
}

// ── Recording serial sink ────────────────────────────────────

/// Serial sink that records every line.
pub struct RecordingSink {
    pub lines: Vec<String>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn exports(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.starts_with("EXP:"))
            .map(String::as_str)
            .collect()
    }

    pub fn logs(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.starts_with("LOG:"))
            .map(String::as_str)
            .collect()
    }
}

impl LineSink for RecordingSink {
    fn line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}
