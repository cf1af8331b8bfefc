//! HTTP surface of the task source

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use primehack::transport::http::{BATCH_PATH, PRIMES_PATH, RANGE_PATH, SUBMIT_PATH, TASK_PATH, WORKER_ID_HEADER};
use primehack::transport::{BatchMessage, PrimesMessage, RangeMessage, SubmitMessage, TaskMessage};

use crate::error::LedgerError;
use crate::ledger::{Ledger, StatusReport, SubmitOutcome};

pub const STATUS_PATH: &str = "/api/status";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Mutex<Ledger>>,
}

impl AppState {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }
}

/// Reply to an accepted submission
#[derive(Debug, Serialize)]
pub struct SubmitReply {
    pub status: &'static str,
    pub prime_exponent: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_prime: Option<bool>,
}

impl From<SubmitOutcome> for SubmitReply {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Applied {
                prime_exponent,
                verdict,
            } => Self {
                status: "applied",
                prime_exponent,
                is_prime: verdict,
            },
            SubmitOutcome::Duplicate { prime_exponent } => Self {
                status: "duplicate",
                prime_exponent,
                is_prime: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchReply {
    pub accepted: usize,
    pub new_primes: usize,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(TASK_PATH, get(get_task))
        .route(SUBMIT_PATH, post(submit))
        .route(RANGE_PATH, get(get_range))
        .route(BATCH_PATH, post(submit_batch))
        .route(PRIMES_PATH, get(get_primes))
        .route(STATUS_PATH, get(status))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Task source listening on http://{}", addr);
    }
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
}

fn worker_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(WORKER_ID_HEADER).and_then(|v| v.to_str().ok())
}

async fn get_task(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let worker = worker_id(&headers);
    debug!(?worker, "get_task: called");
    let claimed = state.ledger.lock().await.claim(Instant::now(), worker);
    match claimed {
        Some(chunk) => {
            info!(
                "Leased M{} [{}, {}) to {}",
                chunk.exponent().p(),
                chunk.start_iter(),
                chunk.end_iter(),
                worker.unwrap_or("anonymous")
            );
            Json(TaskMessage::from_chunk(&chunk)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(message): Json<SubmitMessage>,
) -> Result<Json<SubmitReply>, LedgerError> {
    let worker = worker_id(&headers);
    debug!(?worker, start = message.start, end = message.end, "submit: called");
    let outcome = state.ledger.lock().await.submit(&message);
    match outcome {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(e) => {
            warn!("Rejected submission from {}: {}", worker.unwrap_or("anonymous"), e);
            Err(e)
        }
    }
}

async fn get_range(State(state): State<AppState>) -> Json<RangeMessage> {
    let range = state.ledger.lock().await.claim_range();
    debug!(start = range.start, end = range.end, "get_range: handed out");
    Json(range)
}

async fn submit_batch(
    State(state): State<AppState>,
    Json(batch): Json<BatchMessage>,
) -> Result<Json<BatchReply>, LedgerError> {
    debug!(len = batch.results.len(), "submit_batch: called");
    let new_primes = state.ledger.lock().await.submit_batch(&batch)?;
    Ok(Json(BatchReply {
        accepted: batch.results.len(),
        new_primes,
    }))
}

async fn get_primes(State(state): State<AppState>) -> Json<PrimesMessage> {
    let primes = state.ledger.lock().await.primes();
    Json(PrimesMessage { primes })
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.ledger.lock().await.status())
}
