//! Concurrent package fetcher
//!
//! This module retrieves package details with a fixed-size worker pool:
//! - Each worker builds and owns its own HTTP client
//! - Workers pull IDs from a shared queue until it is empty
//! - Transport failures are retried under the shared `RetryPolicy`
//! - Every ID yields exactly one `FetchOutcome`, in completion order

use crate::config::Config;
use crate::credential::Credential;
use crate::harvester::client::{build_http_client, current_timestamp, Endpoint, SignedApi};
use crate::harvester::parser::{parse_package, DetailData};
use crate::harvester::retry::{RetryFailure, RetryPolicy};
use crate::model::FetchOutcome;
use crate::{FetchError, HarvestError};
use reqwest::Client;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// Number of outcomes between progress log lines
const PROGRESS_INTERVAL: usize = 100;

/// Bounded worker pool retrieving one package per ID
pub struct ConcurrentFetcher {
    config: Arc<Config>,
    retry: RetryPolicy,
}

impl ConcurrentFetcher {
    /// Creates a fetcher using the `[http]` retry settings
    pub fn new(config: Arc<Config>) -> Self {
        let retry = RetryPolicy::from_config(&config.http);
        Self { config, retry }
    }

    /// Overrides the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches every ID in `ids` using at most `concurrency` workers
    ///
    /// The credential snapshot is shared read-only by all workers. Outcomes
    /// are returned in completion order, one per requested ID. Only a failure
    /// to build a client is reported as an error. IDs lost to a panicked
    /// worker come back as `Worker` failures.
    pub async fn fetch_all(
        &self,
        ids: &BTreeSet<i64>,
        credential: Arc<Credential>,
        concurrency: usize,
    ) -> Result<Vec<FetchOutcome>, HarvestError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let width = concurrency.clamp(1, ids.len());
        tracing::info!("Fetching {} IDs with {} workers", ids.len(), width);

        let queue = Arc::new(Mutex::new(ids.iter().copied().collect::<VecDeque<_>>()));
        let api = SignedApi::new(Arc::clone(&self.config));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();

        for worker_id in 0..width {
            let worker = FetchWorker {
                id: worker_id,
                client: build_http_client(&self.config.http, &self.config.client)?,
                api: api.clone(),
                credential: Arc::clone(&credential),
                retry: self.retry,
            };
            let queue = Arc::clone(&queue);
            let tx = tx.clone();

            workers.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(id) = next else { break };

                    let outcome = worker.fetch(id).await;
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
                tracing::trace!("Worker {} finished", worker.id);
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(ids.len());
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
            if outcomes.len() % PROGRESS_INTERVAL == 0 {
                tracing::info!("Progress: {}/{} IDs fetched", outcomes.len(), ids.len());
            }
        }

        let mut lost = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Fetch worker stopped abnormally: {}", e);
                lost = Some(e.to_string());
            }
        }

        if let Some(reason) = lost {
            fill_missing(ids, &mut outcomes, &reason);
        }

        Ok(outcomes)
    }
}

/// Adds a `Worker` failure for every ID that has no outcome yet
///
/// A worker that dies mid-fetch takes its current ID with it. The outcomes
/// already collected are kept so the rest of the run is still persisted.
fn fill_missing(ids: &BTreeSet<i64>, outcomes: &mut Vec<FetchOutcome>, reason: &str) {
    let seen: BTreeSet<i64> = outcomes.iter().map(FetchOutcome::id).collect();
    for &id in ids.difference(&seen) {
        tracing::warn!("Package {} has no outcome, recording as failed", id);
        outcomes.push(FetchOutcome::Failure {
            id,
            error: FetchError::Worker(reason.to_string()),
        });
    }
}

/// One pool member and the resources it owns
struct FetchWorker {
    id: usize,
    client: Client,
    api: SignedApi,
    credential: Arc<Credential>,
    retry: RetryPolicy,
}

impl FetchWorker {
    async fn fetch(&self, id: i64) -> FetchOutcome {
        match fetch_package(&self.client, &self.api, &self.credential, self.retry, id).await {
            Ok(outcome) => outcome,
            Err(error) => {
                match &error {
                    FetchError::Application { code, message } => {
                        tracing::error!("Package {} rejected (code {}): {}", id, code, message)
                    }
                    other => tracing::warn!("Package {} failed: {}", id, other),
                }
                FetchOutcome::Failure { id, error }
            }
        }
    }
}

/// Fetches and classifies a single package
///
/// # Classification
///
/// | Response | Result |
/// |----------|--------|
/// | Transport error | Retried, then `Err(Transport)` |
/// | Non-200 status | `Err(Status)`, not retried |
/// | Unparseable body | `Err(Malformed)`, not retried |
/// | Non-zero code | `Err(Application)` |
/// | Code 0 with another package's ID | `Err(Malformed)` |
/// | Code 0 without a package | `Ok(Empty)` |
/// | Code 0 with a package | `Ok(Success)` |
pub async fn fetch_package(
    client: &Client,
    api: &SignedApi,
    credential: &Credential,
    retry: RetryPolicy,
    id: i64,
) -> Result<FetchOutcome, FetchError> {
    let headers = api.headers(credential, Endpoint::Detail, Some(id));

    let envelope = retry
        .run(
            &format!("Package {}", id),
            |attempt| {
                tracing::debug!("Fetching package {} (attempt {})", id, attempt);
                let signed = api.detail_request(credential, id, current_timestamp());
                let headers = headers.clone();
                async move {
                    api.get::<DetailData>(client, Endpoint::Detail, &signed, headers)
                        .await
                }
            },
            FetchError::is_transport,
        )
        .await
        .map_err(RetryFailure::into_fetch_error)?;

    match envelope.into_data()?.and_then(|data| data.package) {
        Some(raw) if raw.id != id => Err(FetchError::Malformed(format!(
            "requested package {} but received package {}",
            id, raw.id
        ))),
        Some(raw) => Ok(FetchOutcome::Success(parse_package(raw))),
        None => {
            tracing::debug!("Package {} does not exist", id);
            Ok(FetchOutcome::Empty { id })
        }
    }
}
