//! Info lines shown on the display
//!
//! The display shows short status strings ("Got 12 items", "Now playing item #4",
//! ...). [`InfoLog`] keeps the most recent ones in a bounded buffer and broadcasts
//! every new line to live consumers. The core never reads the buffer back.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Default number of retained lines
pub const DEFAULT_INFO_CAPACITY: usize = 50;

/// Lines shown by a display that renders only the tail of the log
pub const DISPLAYED_INFO_LINES: usize = 5;

/// A timestamped status line
#[derive(Debug, Clone, Serialize)]
pub struct InfoEntry {
    pub at: DateTime<Local>,
    pub message: String,
}

/// Shared, bounded, append-only sequence of status lines
#[derive(Debug, Clone)]
pub struct InfoLog {
    buffer: Arc<RwLock<VecDeque<InfoEntry>>>,
    capacity: usize,
    tx: broadcast::Sender<InfoEntry>,
}

impl Default for InfoLog {
    fn default() -> Self {
        Self::new(DEFAULT_INFO_CAPACITY)
    }
}

impl InfoLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            tx: broadcast::channel(256).0,
        }
    }

    /// Appends a line, dropping the oldest one when full
    pub fn push(&self, message: impl Into<String>) {
        let entry = InfoEntry {
            at: Local::now(),
            message: message.into(),
        };
        tracing::info!(target: "pmodisplay::info", "{}", entry.message);

        {
            let mut buf = self.buffer.write().unwrap_or_else(PoisonError::into_inner);
            if buf.len() == self.capacity {
                buf.pop_front();
            }
            buf.push_back(entry.clone());
        }
        let _ = self.tx.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InfoEntry> {
        self.tx.subscribe()
    }

    /// Every retained line, oldest first
    pub fn dump(&self) -> Vec<InfoEntry> {
        self.buffer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// The `n` most recent messages, oldest first
    pub fn recent(&self, n: usize) -> Vec<String> {
        let buf = self.buffer.read().unwrap_or_else(PoisonError::into_inner);
        let skip = buf.len().saturating_sub(n);
        buf.iter().skip(skip).map(|e| e.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
