//! Ledger - global progress, leases and found primes
//!
//! Every exponent moves through the same chunk state machine the workers use.
//! A lease records which chunk of an exponent is out; there is at most one per
//! exponent because each chunk starts from the residue the previous one ends on.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use num_bigint::BigUint;
use serde::Serialize;
use tracing::{debug, info, warn};

use primehack::chunker::{Chunk, ChunkResult, ExponentSummary, ExponentUnderTest, MIN_EXPONENT, Progress, TaskChunker};
use primehack::codec;
use primehack::engine::{is_prime_small, mersenne};
use primehack::transport::{BatchMessage, RangeMessage, SubmitMessage};

use crate::config::LedgerConfig;
use crate::error::LedgerError;

/// A chunk handed out and not yet answered
#[derive(Debug, Clone)]
struct Lease {
    chunk: Chunk,
    worker: Option<String>,
    expires_at: Instant,
}

/// What a submission did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Folded in; `verdict` is set when the exponent finished
    Applied { prime_exponent: u64, verdict: Option<bool> },
    /// The same triple was already applied; nothing changed
    Duplicate { prime_exponent: u64 },
}

/// Snapshot served on `/api/status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub exponents: Vec<ExponentSummary>,
    pub leases: usize,
    pub primes_found: usize,
    pub next_exponent: Option<u64>,
    pub next_range_start: u64,
}

/// All task source state; callers serialize access
#[derive(Debug)]
pub struct Ledger {
    config: LedgerConfig,
    lease_timeout: Duration,
    chunker: TaskChunker,
    leases: BTreeMap<u64, Lease>,
    last_applied: HashMap<u64, ChunkResult>,
    primes: BTreeSet<BigUint>,
    next_exponent: Option<u64>,
    range_counter: u64,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        debug!(?config, "Ledger::new: called");
        let next_exponent = next_prime_exponent(config.first_exponent, config.last_exponent);
        Self {
            lease_timeout: Duration::from_secs(config.lease_timeout_secs),
            range_counter: config.range_start,
            config,
            chunker: TaskChunker::new(),
            leases: BTreeMap::new(),
            last_applied: HashMap::new(),
            primes: BTreeSet::new(),
            next_exponent,
        }
    }

    /// Hand out the next chunk, if any work is available
    ///
    /// Expired leases go back to the pool first. Started exponents are
    /// preferred over opening new ones.
    pub fn claim(&mut self, now: Instant, worker: Option<&str>) -> Option<Chunk> {
        debug!(?worker, "claim: called");
        self.expire_leases(now);

        let resumable = self.chunker.resumable().find(|p| !self.leases.contains_key(p));
        let p = match resumable {
            Some(p) => {
                if let Err(e) = self.chunker.reopen(p) {
                    warn!("Cannot reopen M{}: {}", p, e);
                    return None;
                }
                p
            }
            None => self.open_next()?,
        };

        let chunk = match self.chunker.issue(p, self.config.chunk_size) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Cannot issue chunk for M{}: {}", p, e);
                return None;
            }
        };
        debug!(p, start = chunk.start_iter(), end = chunk.end_iter(), "claim: leased");
        self.leases.insert(
            p,
            Lease {
                chunk: chunk.clone(),
                worker: worker.map(str::to_string),
                expires_at: now + self.lease_timeout,
            },
        );
        Some(chunk)
    }

    /// Fold a submitted result into global state
    pub fn submit(&mut self, message: &SubmitMessage) -> Result<SubmitOutcome, LedgerError> {
        debug!(start = message.start, end = message.end, p = ?message.prime_exponent, "submit: called");
        let result = message.to_result()?;
        let p = self.resolve_exponent(message.prime_exponent, &result)?;

        if self.last_applied.get(&p) == Some(&result) {
            debug!(p, "submit: duplicate");
            return Ok(SubmitOutcome::Duplicate { prime_exponent: p });
        }

        let lease = match self.leases.get(&p) {
            Some(lease) if lease.chunk.start_iter() == result.start_iter && lease.chunk.end_iter() == result.end_iter => lease,
            Some(lease) => {
                return Err(LedgerError::Mismatch(format!(
                    "M{} has [{}, {}) outstanding, got [{}, {})",
                    p,
                    lease.chunk.start_iter(),
                    lease.chunk.end_iter(),
                    result.start_iter,
                    result.end_iter
                )));
            }
            None => return Err(LedgerError::Mismatch(format!("M{} has no chunk outstanding", p))),
        };

        let progress = self.chunker.apply_result(&lease.chunk, &result)?;
        if let Some(lease) = self.leases.remove(&p) {
            debug!(p, worker = ?lease.worker, "submit: lease released");
        }
        self.last_applied.insert(p, result);

        let verdict = match progress {
            Progress::Resume(_) => None,
            Progress::Complete(done) => {
                let is_prime = done.is_prime();
                if is_prime {
                    info!("Found Mersenne prime M{}", p);
                    self.primes.insert(mersenne(p));
                } else {
                    info!("M{} is composite (res64 {})", p, codec::res64(&done.residue));
                }
                Some(is_prime)
            }
        };
        Ok(SubmitOutcome::Applied {
            prime_exponent: p,
            verdict,
        })
    }

    /// Hand out the next inclusive range to scan
    pub fn claim_range(&mut self) -> RangeMessage {
        let start = self.range_counter;
        let end = start.saturating_add(self.config.range_width.saturating_sub(1));
        self.range_counter = end.saturating_add(1);
        debug!(start, end, "claim_range: called");
        RangeMessage { start, end }
    }

    /// Record the primes of a scanned batch; returns how many were new
    pub fn submit_batch(&mut self, batch: &BatchMessage) -> Result<usize, LedgerError> {
        debug!(len = batch.results.len(), "submit_batch: called");
        let results = batch.decode()?;
        let added = results
            .into_iter()
            .filter(|r| r.is_prime)
            .filter(|r| self.primes.insert(r.value.clone()))
            .count();
        if added > 0 {
            info!("Recorded {} new primes from range scan", added);
        }
        Ok(added)
    }

    /// Every prime recorded so far, ascending
    pub fn primes(&self) -> Vec<String> {
        self.primes.iter().map(codec::encode).collect()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            exponents: self.chunker.summaries(),
            leases: self.leases.len(),
            primes_found: self.primes.len(),
            next_exponent: self.next_exponent,
            next_range_start: self.range_counter,
        }
    }

    /// Whether every exponent the policy allows is finished
    pub fn is_exhausted(&self) -> bool {
        self.next_exponent.is_none() && self.chunker.resumable().next().is_none()
    }

    fn expire_leases(&mut self, now: Instant) {
        let expired: Vec<u64> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(p, _)| *p)
            .collect();
        for p in expired {
            if let Some(lease) = self.leases.remove(&p) {
                warn!(
                    "Lease on M{} [{}, {}) expired (worker {:?})",
                    p,
                    lease.chunk.start_iter(),
                    lease.chunk.end_iter(),
                    lease.worker
                );
            }
            self.chunker.abandon(p);
        }
    }

    /// Start the next exponent from the policy, if the active limit allows
    fn open_next(&mut self) -> Option<u64> {
        if self.chunker.resumable().count() >= self.config.max_active {
            debug!("open_next: active limit reached");
            return None;
        }
        loop {
            let p = self.next_exponent?;
            self.next_exponent = p
                .checked_add(1)
                .and_then(|n| next_prime_exponent(n, self.config.last_exponent));

            if p < MIN_EXPONENT {
                // M2 = 3 needs no iterations
                info!("Found Mersenne prime M{}", p);
                self.primes.insert(mersenne(p));
                continue;
            }
            let exponent = match ExponentUnderTest::new(p) {
                Ok(exponent) => exponent,
                Err(e) => {
                    warn!("Skipping M{}: {}", p, e);
                    continue;
                }
            };
            if let Err(e) = self.chunker.open(exponent) {
                warn!("Skipping M{}: {}", p, e);
                continue;
            }
            info!("Opened M{}", p);
            return Some(p);
        }
    }

    /// Find the exponent a submission belongs to
    ///
    /// Without an explicit exponent the `(start, end)` pair must match exactly
    /// one outstanding lease, or exactly one already-applied result.
    fn resolve_exponent(&self, explicit: Option<u64>, result: &ChunkResult) -> Result<u64, LedgerError> {
        if let Some(p) = explicit {
            return Ok(p);
        }
        let leased: Vec<u64> = self
            .leases
            .iter()
            .filter(|(_, l)| l.chunk.start_iter() == result.start_iter && l.chunk.end_iter() == result.end_iter)
            .map(|(p, _)| *p)
            .collect();
        if let [p] = leased.as_slice() {
            return Ok(*p);
        }
        let applied: Vec<u64> = self
            .last_applied
            .iter()
            .filter(|(_, r)| *r == result)
            .map(|(p, _)| *p)
            .collect();
        match applied.as_slice() {
            [p] => Ok(*p),
            _ => Err(LedgerError::Mismatch(format!(
                "cannot tell which exponent [{}, {}) belongs to",
                result.start_iter, result.end_iter
            ))),
        }
    }
}

/// Smallest prime `p >= from` within the optional bound
///
/// Composite exponents never give Mersenne primes, so the policy skips them.
fn next_prime_exponent(from: u64, last: Option<u64>) -> Option<u64> {
    let mut p = from.max(2);
    loop {
        if let Some(last) = last
            && p > last
        {
            return None;
        }
        if is_prime_small(p) {
            return Some(p);
        }
        p = p.checked_add(1)?;
    }
}
