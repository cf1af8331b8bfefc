//! PrimeHack - distributed Lucas-Lehmer worker
//!
//! A task source splits the Lucas-Lehmer test of `2^p - 1` into bounded
//! iteration ranges. Workers claim a range together with the residue it
//! starts from, advance it locally and report the residue it ends on, so a
//! test of millions of iterations is resumable at every chunk boundary.
//!
//! # Modules
//!
//! - [`codec`] - lossless decimal encoding of big integers
//! - [`engine`] - the squaring kernel and primality predicates
//! - [`chunker`] - chunk derivation and the per-exponent state machine
//! - [`transport`] - claim/submit protocol and its HTTP client
//! - [`worker`] - the worker loop and its session
//! - [`check`] - local, network-free Lucas-Lehmer runs
//! - [`events`] - in-process event bus
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod check;
pub mod chunker;
pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod events;
pub mod transport;
pub mod worker;

// Re-export commonly used types
pub use check::{CheckReport, lucas_lehmer};
pub use chunker::{Chunk, ChunkError, ChunkResult, ExponentUnderTest, Progress, TaskChunker, next_chunk};
pub use codec::CodecError;
pub use config::Config;
pub use engine::{EngineError, NativeEngine, ResidueEngine, Verdict};
pub use events::{EventBus, EventEmitter, EventLogEntry, WorkerEvent, create_event_bus};
pub use transport::{HttpTransport, TransportClient, TransportError};
pub use worker::{WorkMode, WorkerError, WorkerHandle, WorkerLoop, WorkerSession, WorkerState};
