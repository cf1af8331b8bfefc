//! Event types for worker activity streaming
//!
//! These events represent all observable activity of a worker:
//! - Loop lifecycle (started, stopped, faulted)
//! - Chunk flow (claimed, submitted, abandoned)
//! - Results (exponent completed, range scanned)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Core event enum - the vocabulary of worker activity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerEvent {
    // === Loop Lifecycle ===
    /// The loop entered `Running`
    Started { worker_id: String, mode: String },
    /// The human-readable status line changed
    StatusChanged { worker_id: String, status: String },
    /// A stop request was honoured at an iteration boundary
    Stopped { worker_id: String, chunks_submitted: u64 },
    /// The kernel failed; the loop halted
    Faulted { worker_id: String, message: String },

    // === Chunk Flow ===
    /// A Lucas-Lehmer chunk was claimed
    ChunkClaimed {
        worker_id: String,
        prime_exponent: u64,
        start_iter: u64,
        end_iter: u64,
    },
    /// A chunk result was acknowledged by the source
    ChunkSubmitted {
        worker_id: String,
        prime_exponent: u64,
        start_iter: u64,
        end_iter: u64,
        /// Low 64 bits of the residue, hex
        res64: String,
        duration_ms: u64,
    },
    /// An iteration was given up without changing accumulated state
    ChunkAbandoned {
        worker_id: String,
        kind: String,
        reason: String,
    },

    // === Results ===
    /// The final chunk of an exponent was submitted
    ExponentCompleted {
        worker_id: String,
        prime_exponent: u64,
        is_prime: bool,
    },
    /// A range-scan batch was acknowledged
    RangeScanned {
        worker_id: String,
        start: u64,
        end: u64,
        primes_found: usize,
    },
}

impl WorkerEvent {
    /// Get the worker ID for this event
    pub fn worker_id(&self) -> &str {
        match self {
            WorkerEvent::Started { worker_id, .. }
            | WorkerEvent::StatusChanged { worker_id, .. }
            | WorkerEvent::Stopped { worker_id, .. }
            | WorkerEvent::Faulted { worker_id, .. }
            | WorkerEvent::ChunkClaimed { worker_id, .. }
            | WorkerEvent::ChunkSubmitted { worker_id, .. }
            | WorkerEvent::ChunkAbandoned { worker_id, .. }
            | WorkerEvent::ExponentCompleted { worker_id, .. }
            | WorkerEvent::RangeScanned { worker_id, .. } => worker_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkerEvent::Started { .. } => "Started",
            WorkerEvent::StatusChanged { .. } => "StatusChanged",
            WorkerEvent::Stopped { .. } => "Stopped",
            WorkerEvent::Faulted { .. } => "Faulted",
            WorkerEvent::ChunkClaimed { .. } => "ChunkClaimed",
            WorkerEvent::ChunkSubmitted { .. } => "ChunkSubmitted",
            WorkerEvent::ChunkAbandoned { .. } => "ChunkAbandoned",
            WorkerEvent::ExponentCompleted { .. } => "ExponentCompleted",
            WorkerEvent::RangeScanned { .. } => "RangeScanned",
        }
    }

    /// Whether this event ends the loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerEvent::Stopped { .. } | WorkerEvent::Faulted { .. })
    }
}

/// An event stamped with the time it was emitted
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: WorkerEvent,
}

impl EventLogEntry {
    pub fn now(event: WorkerEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
