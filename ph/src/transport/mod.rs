//! Transport to the task source
//!
//! Two request/response operations carry the protocol (claim a chunk, submit
//! its result); the range-scan variant and the primes listing ride alongside.

use async_trait::async_trait;
use num_bigint::BigUint;

mod error;
pub mod http;
mod messages;

pub use error::TransportError;
pub use http::HttpTransport;
pub use messages::{BatchMessage, PrimesMessage, RangeMessage, ScanResult, SubmitMessage, TaskMessage};

use crate::chunker::{Chunk, ChunkResult};

/// Client side of the task source protocol
///
/// Implementations must bound every call with a timeout and classify any
/// non-success. Both submit operations are idempotent on the source side, but
/// callers never retry them blindly.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Claim the next Lucas-Lehmer chunk
    async fn claim(&self) -> Result<Chunk, TransportError>;

    /// Report the residue reached at the end of a chunk
    async fn submit(&self, prime_exponent: u64, result: &ChunkResult) -> Result<(), TransportError>;

    /// Claim an inclusive integer range to scan
    async fn claim_range(&self) -> Result<RangeMessage, TransportError>;

    /// Report the primality of every integer in a scanned range
    async fn submit_batch(&self, results: &[ScanResult]) -> Result<(), TransportError>;

    /// Primes the source has recorded so far
    async fn list_primes(&self) -> Result<Vec<BigUint>, TransportError>;
}
