//! Event Bus - in-process pub/sub for worker activity
//!
//! Built on a tokio broadcast channel. The worker loop emits, the CLI
//! progress printer subscribes. Emitting never blocks.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::WorkerEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Central event bus for worker activity
pub struct EventBus {
    tx: broadcast::Sender<WorkerEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped; a lagging
    /// subscriber loses the oldest events.
    pub fn emit(&self, event: WorkerEvent) {
        debug!(
            event_type = event.event_type(),
            worker_id = event.worker_id(),
            "EventBus::emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to one worker
    pub fn emitter_for(&self, worker_id: impl Into<String>) -> EventEmitter {
        let worker_id = worker_id.into();
        debug!(%worker_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            worker_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for components to emit events without owning the bus
///
/// Cheap to clone; every event carries the pre-set worker ID.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<WorkerEvent>,
    worker_id: String,
}

impl EventEmitter {
    /// An emitter with no bus behind it; every event is dropped
    pub fn detached(worker_id: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            worker_id: worker_id.into(),
        }
    }

    /// Get the worker ID this emitter is bound to
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: WorkerEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn started(&self, mode: &str) {
        self.emit(WorkerEvent::Started {
            worker_id: self.worker_id.clone(),
            mode: mode.to_string(),
        });
    }

    pub fn status_changed(&self, status: &str) {
        self.emit(WorkerEvent::StatusChanged {
            worker_id: self.worker_id.clone(),
            status: status.to_string(),
        });
    }

    pub fn stopped(&self, chunks_submitted: u64) {
        self.emit(WorkerEvent::Stopped {
            worker_id: self.worker_id.clone(),
            chunks_submitted,
        });
    }

    pub fn faulted(&self, message: &str) {
        self.emit(WorkerEvent::Faulted {
            worker_id: self.worker_id.clone(),
            message: message.to_string(),
        });
    }

    pub fn chunk_claimed(&self, prime_exponent: u64, start_iter: u64, end_iter: u64) {
        self.emit(WorkerEvent::ChunkClaimed {
            worker_id: self.worker_id.clone(),
            prime_exponent,
            start_iter,
            end_iter,
        });
    }

    pub fn chunk_submitted(&self, prime_exponent: u64, start_iter: u64, end_iter: u64, res64: String, duration_ms: u64) {
        self.emit(WorkerEvent::ChunkSubmitted {
            worker_id: self.worker_id.clone(),
            prime_exponent,
            start_iter,
            end_iter,
            res64,
            duration_ms,
        });
    }

    pub fn chunk_abandoned(&self, kind: &str, reason: &str) {
        self.emit(WorkerEvent::ChunkAbandoned {
            worker_id: self.worker_id.clone(),
            kind: kind.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn exponent_completed(&self, prime_exponent: u64, is_prime: bool) {
        self.emit(WorkerEvent::ExponentCompleted {
            worker_id: self.worker_id.clone(),
            prime_exponent,
            is_prime,
        });
    }

    pub fn range_scanned(&self, start: u64, end: u64, primes_found: usize) {
        self.emit(WorkerEvent::RangeScanned {
            worker_id: self.worker_id.clone(),
            start,
            end,
            primes_found,
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}
