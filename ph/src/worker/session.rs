//! Process-local worker session

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

/// Default number of history entries kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// One recorded outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// A submitted Lucas-Lehmer chunk
    Residue {
        prime_exponent: u64,
        start_iter: u64,
        end_iter: u64,
        res64: String,
    },
    /// The final chunk of an exponent was submitted
    Verdict { prime_exponent: u64, is_prime: bool },
    /// A prime found while scanning a range
    Prime { numeral: String },
}

/// Running flag, status line and bounded most-recent-first history
///
/// Owned by the worker loop; never shared across tasks.
#[derive(Debug)]
pub struct WorkerSession {
    id: String,
    running: bool,
    last_status: String,
    history: VecDeque<HistoryEntry>,
    capacity: usize,
    chunks_submitted: u64,
}

impl WorkerSession {
    pub fn new(capacity: usize) -> Self {
        Self::with_id(uuid::Uuid::now_v7().to_string(), capacity)
    }

    pub fn with_id(id: impl Into<String>, capacity: usize) -> Self {
        let id = id.into();
        debug!(%id, capacity, "WorkerSession::with_id: called");
        Self {
            id,
            running: false,
            last_status: "idle".to_string(),
            history: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity: capacity.max(1),
            chunks_submitted: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn status(&self) -> &str {
        &self.last_status
    }

    /// Replace the status line; returns whether it changed
    pub fn set_status(&mut self, status: impl Into<String>) -> bool {
        let status = status.into();
        if status == self.last_status {
            return false;
        }
        self.last_status = status;
        true
    }

    /// Push to the front, dropping the oldest entry once full
    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push_front(entry);
        self.history.truncate(self.capacity);
    }

    /// Entries, most recent first
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn chunks_submitted(&self) -> u64 {
        self.chunks_submitted
    }

    pub(super) fn count_submission(&mut self) {
        self.chunks_submitted += 1;
    }
}

impl Default for WorkerSession {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
