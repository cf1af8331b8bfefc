//! WorkerLoop - claim, advance, submit, record, pause

use std::sync::Arc;
use std::time::{Duration, Instant};

use num_bigint::BigUint;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::scan::{scan_range, validate_range};
use super::{HistoryEntry, WorkMode, WorkerError, WorkerSession};
use crate::chunker::{Chunk, ChunkResult, Progress, TaskChunker};
use crate::codec;
use crate::config::WorkerConfig;
use crate::engine::ResidueEngine;
use crate::events::{EventBus, EventEmitter};
use crate::transport::{ScanResult, TransportClient, TransportError};

/// Lifecycle of the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Faulted { reason: String },
}

/// Result of a single iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationResult {
    /// A Lucas-Lehmer chunk was computed and acknowledged
    Submitted {
        prime_exponent: u64,
        end_iter: u64,
        /// Set when this chunk finished the exponent
        verdict: Option<bool>,
    },
    /// A range was classified and acknowledged
    Scanned { start: u64, end: u64, primes_found: usize },
    /// The source had nothing to hand out
    Unavailable,
    /// The iteration was given up; fatal errors have already moved the loop to `Faulted`
    Error { error: WorkerError },
}

/// Requests a cooperative stop from outside the loop
#[derive(Clone)]
pub struct WorkerHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl WorkerHandle {
    /// Ask the loop to stop at the next iteration boundary
    pub fn stop(&self) {
        debug!("WorkerHandle::stop: called");
        self.tx.send_replace(true);
    }
}

/// One worker: a strictly sequential claim/advance/submit loop
pub struct WorkerLoop {
    transport: Arc<dyn TransportClient>,
    engine: Arc<dyn ResidueEngine>,
    chunker: TaskChunker,
    config: WorkerConfig,
    session: WorkerSession,
    state: WorkerState,
    emitter: EventEmitter,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl WorkerLoop {
    pub fn new(transport: Arc<dyn TransportClient>, engine: Arc<dyn ResidueEngine>, config: WorkerConfig) -> Self {
        Self::with_id(uuid::Uuid::now_v7().to_string(), transport, engine, config)
    }

    /// Build a loop whose session carries `worker_id`
    pub fn with_id(
        worker_id: impl Into<String>,
        transport: Arc<dyn TransportClient>,
        engine: Arc<dyn ResidueEngine>,
        config: WorkerConfig,
    ) -> Self {
        let session = WorkerSession::with_id(worker_id, config.history_capacity);
        debug!(worker_id = session.id(), mode = %config.mode, "WorkerLoop::with_id: called");
        let emitter = EventEmitter::detached(session.id());
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            transport,
            engine,
            chunker: TaskChunker::new(),
            config,
            session,
            state: WorkerState::Idle,
            emitter,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        }
    }

    /// Publish this worker's events on `bus`
    pub fn with_events(mut self, bus: &EventBus) -> Self {
        self.emitter = bus.emitter_for(self.session.id());
        self
    }

    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    pub fn session(&self) -> &WorkerSession {
        &self.session
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn chunker(&self) -> &TaskChunker {
        &self.chunker
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Run until stopped, the chunk budget is spent, or the kernel faults
    ///
    /// Stop requests are only observed between iterations; an advance in
    /// flight always runs to completion.
    pub async fn run(&mut self) -> Result<(), WorkerError> {
        debug!(worker_id = self.session.id(), mode = %self.config.mode, "run: called");
        info!(
            "Worker {} starting (mode: {}, max_chunks: {:?})",
            self.session.id(),
            self.config.mode,
            self.config.max_chunks
        );
        self.state = WorkerState::Running;
        self.session.set_running(true);
        self.emitter.started(&self.config.mode.to_string());

        loop {
            if self.stop_requested() {
                debug!("run: stop requested");
                break;
            }
            if let Some(max) = self.config.max_chunks
                && self.session.chunks_submitted() >= max
            {
                info!("Worker {} reached max_chunks={}", self.session.id(), max);
                break;
            }

            let result = match self.config.mode {
                WorkMode::LucasLehmer => self.run_iteration().await,
                WorkMode::RangeScan => self.run_scan_iteration().await,
            };

            let pause = match result {
                IterationResult::Submitted { .. } | IterationResult::Scanned { .. } => {
                    debug!("run: iteration done, pausing");
                    self.config.pause_ms
                }
                IterationResult::Unavailable => {
                    debug!("run: no work, idle pause");
                    self.config.idle_pause_ms
                }
                IterationResult::Error { error } if error.is_fatal() => {
                    debug!(%error, "run: fatal error");
                    self.session.set_running(false);
                    return Err(error);
                }
                IterationResult::Error { error } => {
                    debug!(%error, "run: recoverable error, continuing");
                    self.config.pause_ms
                }
            };

            if self.pause(Duration::from_millis(pause)).await {
                debug!("run: stop requested during pause");
                break;
            }
        }

        self.state = WorkerState::Idle;
        self.session.set_running(false);
        self.set_status("stopped");
        self.emitter.stopped(self.session.chunks_submitted());
        info!(
            "Worker {} stopped after {} submissions",
            self.session.id(),
            self.session.chunks_submitted()
        );
        Ok(())
    }

    /// One Lucas-Lehmer iteration: claim, advance, record, submit
    pub async fn run_iteration(&mut self) -> IterationResult {
        debug!("run_iteration: called");
        self.set_status("claiming chunk");
        let chunk = match self.transport.claim().await {
            Ok(chunk) => chunk,
            Err(TransportError::TaskUnavailable) => {
                debug!("run_iteration: no task available");
                self.set_status("no task available");
                return IterationResult::Unavailable;
            }
            Err(e) => return self.abandon(None, e.into()),
        };

        let p = chunk.exponent().p();
        self.emitter.chunk_claimed(p, chunk.start_iter(), chunk.end_iter());
        // Only the exponent in flight is tracked locally
        self.chunker.retain(|q| q == p);
        if let Err(e) = self.chunker.admit(&chunk) {
            return self.abandon(Some(p), e.into());
        }

        self.set_status(format!(
            "computing {} iterations {}..{} of {}",
            chunk.exponent(),
            chunk.start_iter(),
            chunk.end_iter(),
            chunk.exponent().total_iterations()
        ));
        let started = Instant::now();
        let residue_after = match self.advance(&chunk).await {
            Ok(residue) => residue,
            Err(e) => return self.fault(e),
        };
        let duration_ms = millis(started.elapsed());

        let result = ChunkResult {
            start_iter: chunk.start_iter(),
            end_iter: chunk.end_iter(),
            residue_after,
        };
        // Checked against the chunk only; the tracker moves once the source acknowledges
        let progress = match chunk.apply_result(&result) {
            Ok(progress) => progress,
            Err(e) => return self.abandon(Some(p), e.into()),
        };

        self.set_status(format!("submitting {} up to iteration {}", chunk.exponent(), result.end_iter));
        if let Err(e) = self.transport.submit(p, &result).await {
            return self.abandon(Some(p), e.into());
        }
        match &progress {
            Progress::Resume(_) => {
                if let Err(e) = self.chunker.apply_result(&chunk, &result) {
                    warn!("Local position for M{} out of step: {}", p, e);
                    self.chunker.forget(p);
                }
            }
            Progress::Complete(_) => {
                self.chunker.forget(p);
            }
        }

        let res64 = codec::res64(&result.residue_after);
        self.session.count_submission();
        self.session.record(HistoryEntry::Residue {
            prime_exponent: p,
            start_iter: result.start_iter,
            end_iter: result.end_iter,
            res64: res64.clone(),
        });
        self.emitter
            .chunk_submitted(p, result.start_iter, result.end_iter, res64, duration_ms);

        let verdict = match progress {
            Progress::Resume(_) => None,
            Progress::Complete(done) => {
                let is_prime = done.is_prime();
                info!("{} is {}", done.exponent, if is_prime { "prime" } else { "composite" });
                self.session.record(HistoryEntry::Verdict {
                    prime_exponent: p,
                    is_prime,
                });
                self.emitter.exponent_completed(p, is_prime);
                Some(is_prime)
            }
        };
        self.set_status(format!("submitted {} up to iteration {}", chunk.exponent(), result.end_iter));

        IterationResult::Submitted {
            prime_exponent: p,
            end_iter: result.end_iter,
            verdict,
        }
    }

    /// One range-scan iteration: claim a range, classify it, submit the batch
    pub async fn run_scan_iteration(&mut self) -> IterationResult {
        debug!("run_scan_iteration: called");
        self.set_status("claiming range");
        let range = match self.transport.claim_range().await {
            Ok(range) => range,
            Err(TransportError::TaskUnavailable) => {
                self.set_status("no range available");
                return IterationResult::Unavailable;
            }
            Err(e) => return self.abandon(None, e.into()),
        };
        if let Err(e) = validate_range(&range) {
            return self.abandon(None, e);
        }

        self.set_status(format!("scanning {}..={}", range.start, range.end));
        let engine = Arc::clone(&self.engine);
        let results: Vec<ScanResult> = match tokio::task::spawn_blocking(move || scan_range(engine.as_ref(), range)).await
        {
            Ok(results) => results,
            Err(e) => return self.fault(WorkerError::ComputationFault(format!("scan task failed: {}", e))),
        };

        if let Err(e) = self.transport.submit_batch(&results).await {
            return self.abandon(None, e.into());
        }

        let mut primes_found = 0;
        for found in results.iter().filter(|r| r.is_prime) {
            primes_found += 1;
            self.session.record(HistoryEntry::Prime {
                numeral: codec::encode(&found.value),
            });
        }
        self.session.count_submission();
        self.emitter.range_scanned(range.start, range.end, primes_found);
        self.set_status(format!("scanned {}..={}, {} primes", range.start, range.end, primes_found));

        IterationResult::Scanned {
            start: range.start,
            end: range.end,
            primes_found,
        }
    }

    /// Run the kernel on the blocking pool; a panic there is a fault
    async fn advance(&self, chunk: &Chunk) -> Result<BigUint, WorkerError> {
        debug!(p = chunk.exponent().p(), steps = chunk.steps(), "advance: called");
        let engine = Arc::clone(&self.engine);
        let modulus = chunk.exponent().modulus_arc();
        let residue = chunk.current_residue().clone();
        let steps = chunk.steps();

        match tokio::task::spawn_blocking(move || engine.advance(&residue, &modulus, steps)).await {
            Ok(outcome) => Ok(outcome?),
            Err(e) => Err(WorkerError::ComputationFault(format!("kernel task failed: {}", e))),
        }
    }

    /// Sleep, waking early on a stop request; returns whether to stop
    async fn pause(&mut self, duration: Duration) -> bool {
        if self.stop_requested() {
            return true;
        }
        if !duration.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = self.stop_rx.changed() => {}
            }
        }
        self.stop_requested()
    }

    fn abandon(&mut self, p: Option<u64>, error: WorkerError) -> IterationResult {
        if error.is_fatal() {
            return self.fault(error);
        }
        if let Some(p) = p {
            self.chunker.abandon(p);
        }
        warn!("Abandoning iteration ({}): {}", error.kind(), error);
        self.emitter.chunk_abandoned(error.kind(), &error.to_string());
        self.set_status(format!("abandoned: {}", error));
        IterationResult::Error { error }
    }

    fn fault(&mut self, error: WorkerError) -> IterationResult {
        error!("Worker {} faulted: {}", self.session.id(), error);
        self.state = WorkerState::Faulted {
            reason: error.to_string(),
        };
        self.emitter.faulted(&error.to_string());
        self.set_status(format!("faulted: {}", error));
        IterationResult::Error { error }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        if self.session.set_status(status) {
            debug!(status = self.session.status(), "set_status: changed");
            self.emitter.status_changed(self.session.status());
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ExponentUnderTest, next_chunk};
    use crate::engine::{EngineError, NativeEngine, mersenne};
    use crate::events::WorkerEvent;
    use crate::transport::RangeMessage;
    use crate::transport::mock::MockTransport;

    fn config() -> WorkerConfig {
        WorkerConfig {
            pause_ms: 0,
            idle_pause_ms: 0,
            ..WorkerConfig::default()
        }
    }

    fn chunk(p: u64, start: u64, size: u64) -> Chunk {
        let e = ExponentUnderTest::new(p).unwrap();
        let residue = NativeEngine::new()
            .advance(&e.initial_residue(), e.modulus(), start)
            .unwrap();
        next_chunk(&e, &residue, start, size).unwrap()
    }

    /// Engine whose kernel always fails
    struct FaultyEngine;

    impl ResidueEngine for FaultyEngine {
        fn advance(&self, _: &BigUint, _: &BigUint, _: u64) -> Result<BigUint, EngineError> {
            Err(EngineError::fault("simulated kernel failure"))
        }

        fn mersenne(&self, p: u64) -> BigUint {
            mersenne(p)
        }
    }

    /// Engine whose kernel panics
    struct PanickingEngine;

    impl ResidueEngine for PanickingEngine {
        fn advance(&self, _: &BigUint, _: &BigUint, _: u64) -> Result<BigUint, EngineError> {
            panic!("kernel blew up")
        }

        fn mersenne(&self, p: u64) -> BigUint {
            mersenne(p)
        }
    }

    fn worker(transport: Arc<MockTransport>, engine: Arc<dyn ResidueEngine>, config: WorkerConfig) -> WorkerLoop {
        WorkerLoop::new(transport, engine, config)
    }

    #[tokio::test]
    async fn test_full_exponent_in_chunks() {
        let transport = Arc::new(MockTransport::new().with_claims(vec![Ok(chunk(13, 0, 6)), Ok(chunk(13, 6, 6))]));
        let mut w = worker(transport.clone(), Arc::new(NativeEngine::new()), config());

        let first = w.run_iteration().await;
        assert_eq!(
            first,
            IterationResult::Submitted {
                prime_exponent: 13,
                end_iter: 6,
                verdict: None
            }
        );
        let second = w.run_iteration().await;
        assert_eq!(
            second,
            IterationResult::Submitted {
                prime_exponent: 13,
                end_iter: 11,
                verdict: Some(true)
            }
        );

        let submitted = transport.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[1].1.residue_after, BigUint::from(0u32));
        assert!(w.chunker().is_empty());
        assert!(matches!(
            w.session().history().next(),
            Some(HistoryEntry::Verdict {
                prime_exponent: 13,
                is_prime: true
            })
        ));
    }

    #[tokio::test]
    async fn test_network_error_on_claim_keeps_running() {
        let transport = Arc::new(MockTransport::new().with_claims(vec![
            Err(TransportError::Network("connection refused".to_string())),
            Ok(chunk(7, 0, 10)),
        ]));
        let mut w = worker(
            transport.clone(),
            Arc::new(NativeEngine::new()),
            WorkerConfig {
                max_chunks: Some(1),
                ..config()
            },
        );

        w.run().await.unwrap();
        assert_eq!(transport.claim_count(), 2);
        assert_eq!(transport.submitted().len(), 1);
        assert_eq!(w.state(), &WorkerState::Idle);
        assert!(!w.session().is_running());
    }

    #[tokio::test]
    async fn test_running_flag_survives_network_error() {
        let transport = Arc::new(
            MockTransport::new().with_claims(vec![Err(TransportError::Network("timeout".to_string()))]),
        );
        let mut w = worker(transport.clone(), Arc::new(NativeEngine::new()), config());
        w.session.set_running(true);
        w.state = WorkerState::Running;

        let result = w.run_iteration().await;
        assert!(matches!(result, IterationResult::Error { error: WorkerError::Network(_) }));
        assert!(w.session().is_running());
        assert_eq!(w.state(), &WorkerState::Running);
    }

    #[tokio::test]
    async fn test_submit_network_error_abandons_and_continues() {
        let transport = Arc::new(
            MockTransport::new()
                .with_claims(vec![Ok(chunk(13, 0, 5)), Ok(chunk(13, 0, 5))])
                .with_submits(vec![Err(TransportError::Network("reset".to_string())), Ok(())]),
        );
        let mut w = worker(transport.clone(), Arc::new(NativeEngine::new()), config());

        let result = w.run_iteration().await;
        assert!(matches!(result, IterationResult::Error { error: WorkerError::Network(_) }));
        assert!(matches!(
            w.chunker().state(13),
            Some(crate::chunker::ExponentState::Abandoned { .. })
        ));
        assert_eq!(w.session().history_len(), 0);
        assert_eq!(transport.submitted().len(), 0);

        // Re-issued at the same position
        let result = w.run_iteration().await;
        assert!(matches!(result, IterationResult::Submitted { end_iter: 5, .. }));
        assert_eq!(transport.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_computation_fault_halts_loop() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let transport = Arc::new(MockTransport::new().with_claims(vec![Ok(chunk(7, 0, 10)), Ok(chunk(7, 0, 10))]));
        let mut w = worker(transport.clone(), Arc::new(FaultyEngine), config()).with_events(&bus);

        let err = w.run().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(w.state(), WorkerState::Faulted { .. }));
        assert!(!w.session().is_running());
        assert!(w.session().status().starts_with("faulted"));
        // Never retried
        assert_eq!(transport.claim_count(), 1);
        assert!(transport.submitted().is_empty());

        let mut saw_fault = false;
        while let Ok(event) = rx.try_recv() {
            if let WorkerEvent::Faulted { .. } = event {
                saw_fault = true;
            }
        }
        assert!(saw_fault);
    }

    #[tokio::test]
    async fn test_kernel_panic_is_computation_fault() {
        let transport = Arc::new(MockTransport::new().with_claims(vec![Ok(chunk(7, 0, 10))]));
        let mut w = worker(transport, Arc::new(PanickingEngine), config());

        let result = w.run_iteration().await;
        assert!(matches!(
            result,
            IterationResult::Error {
                error: WorkerError::ComputationFault(_)
            }
        ));
        assert!(matches!(w.state(), WorkerState::Faulted { .. }));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_failed_final_submit_can_be_reclaimed() {
        // M7 needs 5 iterations, so one chunk finishes it
        let transport = Arc::new(
            MockTransport::new()
                .with_claims(vec![Ok(chunk(7, 0, 10)), Ok(chunk(7, 0, 10))])
                .with_submits(vec![Err(TransportError::Network("reset".to_string())), Ok(())]),
        );
        let mut w = worker(transport.clone(), Arc::new(NativeEngine::new()), config());

        let first = w.run_iteration().await;
        assert!(matches!(first, IterationResult::Error { error: WorkerError::Network(_) }));
        assert!(!w.chunker().state(7).unwrap().is_completed());

        let second = w.run_iteration().await;
        assert_eq!(
            second,
            IterationResult::Submitted {
                prime_exponent: 7,
                end_iter: 5,
                verdict: Some(true)
            }
        );
        assert_eq!(transport.submitted().len(), 1);
        assert!(w.chunker().is_empty());
    }

    #[tokio::test]
    async fn test_tracker_holds_only_exponent_in_flight() {
        let mut claims: Vec<_> = (3u64..=200)
            .filter(|&p| crate::engine::is_prime_small(p))
            .map(|p| Ok(chunk(p, 0, 1_000)))
            .collect();
        // A partial chunk leaves its exponent tracked until another is claimed
        claims.insert(3, Ok(chunk(61, 0, 10)));
        let total = claims.len();
        let transport = Arc::new(MockTransport::new().with_claims(claims));
        let mut w = worker(transport, Arc::new(NativeEngine::new()), config());

        for _ in 0..total {
            assert!(matches!(w.run_iteration().await, IterationResult::Submitted { .. }));
            assert!(w.chunker().len() <= 1);
        }
        assert!(w.chunker().is_empty());
        assert_eq!(w.session().chunks_submitted(), total as u64);
    }

    #[tokio::test]
    async fn test_stale_submission_is_abandoned() {
        let transport = Arc::new(
            MockTransport::new()
                .with_claims(vec![Ok(chunk(7, 0, 10))])
                .with_submits(vec![Err(TransportError::ChunkMismatch("already applied".to_string()))]),
        );
        let mut w = worker(transport, Arc::new(NativeEngine::new()), config());

        let result = w.run_iteration().await;
        assert!(matches!(result, IterationResult::Error { error: WorkerError::ChunkMismatch(_) }));
        assert!(!matches!(w.state(), WorkerState::Faulted { .. }));
        assert!(w.session().status().starts_with("abandoned"));
    }

    #[tokio::test]
    async fn test_task_unavailable_is_idle() {
        let transport = Arc::new(MockTransport::new());
        let mut w = worker(transport.clone(), Arc::new(NativeEngine::new()), config());
        assert_eq!(w.run_iteration().await, IterationResult::Unavailable);
        assert_eq!(w.session().status(), "no task available");
    }

    #[tokio::test]
    async fn test_stop_is_observed_at_boundary() {
        let transport = Arc::new(MockTransport::new());
        let mut w = worker(
            transport.clone(),
            Arc::new(NativeEngine::new()),
            WorkerConfig {
                idle_pause_ms: 60_000,
                ..config()
            },
        );
        let handle = w.handle();
        let task = tokio::spawn(async move {
            w.run().await.map(|_| w)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();

        let w = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(w.state(), &WorkerState::Idle);
        assert_eq!(w.session().status(), "stopped");
        assert_eq!(transport.claim_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_run_claims_nothing() {
        let transport = Arc::new(MockTransport::new());
        let mut w = worker(transport.clone(), Arc::new(NativeEngine::new()), config());
        w.handle().stop();
        w.run().await.unwrap();
        assert_eq!(transport.claim_count(), 0);
    }

    #[tokio::test]
    async fn test_scan_iteration_submits_batch() {
        let transport = Arc::new(MockTransport::new().with_ranges(vec![Ok(RangeMessage { start: 10, end: 30 })]));
        let mut w = worker(
            transport.clone(),
            Arc::new(NativeEngine::new()),
            WorkerConfig {
                mode: WorkMode::RangeScan,
                max_chunks: Some(1),
                ..config()
            },
        );

        w.run().await.unwrap();
        let batches = transport.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 21);
        let primes = transport.list_primes().await.unwrap();
        let expected: Vec<BigUint> = [11u32, 13, 17, 19, 23, 29].iter().map(|&n| BigUint::from(n)).collect();
        assert_eq!(primes, expected);
        assert!(matches!(
            w.session().history().next(),
            Some(HistoryEntry::Prime { numeral }) if numeral == "29"
        ));
    }

    #[tokio::test]
    async fn test_malformed_range_is_abandoned() {
        let transport = Arc::new(MockTransport::new().with_ranges(vec![Ok(RangeMessage { start: 9, end: 3 })]));
        let mut w = worker(
            transport.clone(),
            Arc::new(NativeEngine::new()),
            WorkerConfig {
                mode: WorkMode::RangeScan,
                ..config()
            },
        );
        let result = w.run_scan_iteration().await;
        assert!(matches!(result, IterationResult::Error { error: WorkerError::MalformedTask(_) }));
        assert!(transport.batches().is_empty());
    }

    #[tokio::test]
    async fn test_history_bounded_over_many_chunks() {
        let claims = [5, 7, 13, 17, 19].iter().map(|&p| Ok(chunk(p, 0, 100))).collect();
        let transport = Arc::new(MockTransport::new().with_claims(claims));
        let mut w = worker(
            transport,
            Arc::new(NativeEngine::new()),
            WorkerConfig {
                history_capacity: 4,
                max_chunks: Some(5),
                ..config()
            },
        );
        w.run().await.unwrap();
        assert_eq!(w.session().chunks_submitted(), 5);
        assert_eq!(w.session().history_len(), 4);
    }
}
