//! Event bus for live worker observability
//!
//! The worker loop emits a [`WorkerEvent`] for every claim, submission,
//! abandonment and state change. Consumers (the CLI progress printer,
//! tests) subscribe to the bus; the loop never waits on them.
//!
//! ```text
//!   WorkerLoop ──emit──▶ EventBus (broadcast) ──▶ CLI progress
//!                                              └─▶ tests
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = create_event_bus();
//! let emitter = bus.emitter_for(session.id());
//! emitter.chunk_claimed(31, 0, 29);
//!
//! let mut rx = bus.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use types::{EventLogEntry, WorkerEvent};
