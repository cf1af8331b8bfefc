//! HTTP task source client
//!
//! Every request is bounded by the client timeout. Any non-success is
//! classified into a [`TransportError`]; nothing here retries.

use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    BatchMessage, PrimesMessage, RangeMessage, ScanResult, SubmitMessage, TaskMessage, TransportClient,
    TransportError,
};
use crate::chunker::{Chunk, ChunkResult};
use crate::config::SourceConfig;

pub const TASK_PATH: &str = "/api/get-task";
pub const SUBMIT_PATH: &str = "/api/submit";
pub const RANGE_PATH: &str = "/api/range";
pub const BATCH_PATH: &str = "/api/submit-batch";
pub const PRIMES_PATH: &str = "/api/get-primes";

/// Header identifying the worker to the task source
pub const WORKER_ID_HEADER: &str = "x-worker-id";

/// Task source client over HTTP/JSON
pub struct HttpTransport {
    base_url: String,
    worker_id: String,
    http: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration, worker_id: impl Into<String>) -> Result<Self, TransportError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(%base_url, ?timeout, "HttpTransport::new: called");
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("primehack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            base_url,
            worker_id: worker_id.into(),
            http,
        })
    }

    pub fn from_config(config: &SourceConfig, worker_id: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(&config.base_url, Duration::from_millis(config.timeout_ms), worker_id)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        debug!(path, "get_json: called");
        let response = self
            .http
            .get(self.url(path))
            .header(WORKER_ID_HEADER, &self.worker_id)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_json<B: serde::Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), TransportError> {
        debug!(path, "post_json: called");
        let response = self
            .http
            .post(self.url(path))
            .header(WORKER_ID_HEADER, &self.worker_id)
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Turn any non-2xx (and 204 on reads) into a classified error
async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    debug!(%status, "check_status: called");
    if status == StatusCode::NO_CONTENT {
        return Err(TransportError::TaskUnavailable);
    }
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(TransportError::from_status(status.as_u16(), message))
}

#[async_trait]
impl TransportClient for HttpTransport {
    async fn claim(&self) -> Result<Chunk, TransportError> {
        debug!("HttpTransport::claim: called");
        let task: TaskMessage = self.get_json(TASK_PATH).await?;
        task.into_chunk()
    }

    async fn submit(&self, prime_exponent: u64, result: &ChunkResult) -> Result<(), TransportError> {
        debug!(prime_exponent, start = result.start_iter, end = result.end_iter, "HttpTransport::submit: called");
        self.post_json(SUBMIT_PATH, &SubmitMessage::new(prime_exponent, result)).await
    }

    async fn claim_range(&self) -> Result<RangeMessage, TransportError> {
        debug!("HttpTransport::claim_range: called");
        let range: RangeMessage = self.get_json(RANGE_PATH).await?;
        range.validate()?;
        Ok(range)
    }

    async fn submit_batch(&self, results: &[ScanResult]) -> Result<(), TransportError> {
        debug!(count = results.len(), "HttpTransport::submit_batch: called");
        self.post_json(BATCH_PATH, &BatchMessage::new(results)).await
    }

    async fn list_primes(&self) -> Result<Vec<BigUint>, TransportError> {
        debug!("HttpTransport::list_primes: called");
        let listing: PrimesMessage = self.get_json(PRIMES_PATH).await?;
        listing.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let transport = HttpTransport::new("http://localhost:3000/", Duration::from_secs(1), "w").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:3000");
        assert_eq!(transport.url(TASK_PATH), "http://localhost:3000/api/get-task");
    }

    #[tokio::test]
    async fn test_unreachable_source_is_network_error() {
        // Port 9 (discard) on localhost is almost never listening
        let transport = HttpTransport::new("http://127.0.0.1:9", Duration::from_millis(500), "w").unwrap();
        let err = transport.claim().await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {:?}", err);
    }
}
