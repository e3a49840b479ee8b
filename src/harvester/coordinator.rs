//! Harvest coordinator - main run orchestration
//!
//! A run proceeds in strict phases:
//! - Ensure the account credential is fresh (fatal on failure)
//! - Discover the upper bound (degrades to the configured fallback)
//! - Fetch every ID in range concurrently
//! - Forward each fetched resource to the persister

use crate::config::{Config, ScanConfig};
use crate::credential::{AuditLog, CredentialStore, TokenRefresher};
use crate::harvester::client::{build_http_client, SignedApi};
use crate::harvester::discovery::RangeDiscovery;
use crate::harvester::fetcher::ConcurrentFetcher;
use crate::harvester::retry::RetryPolicy;
use crate::model::FetchOutcome;
use crate::output::{HarvestStats, Persister};
use crate::HarvestError;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Main harvest coordinator structure
pub struct Harvester<S> {
    config: Arc<Config>,
    store: Arc<Mutex<S>>,
    persister: Arc<dyn Persister>,
}

impl<S> Harvester<S>
where
    S: CredentialStore + AuditLog,
{
    pub fn new(config: Arc<Config>, store: Arc<Mutex<S>>, persister: Arc<dyn Persister>) -> Self {
        Self {
            config,
            store,
            persister,
        }
    }

    /// Runs one harvest and returns its statistics
    ///
    /// Only credential, storage and client-construction failures abort the
    /// run. Per-ID failures and persist failures are counted in the returned
    /// statistics.
    pub async fn run(&self) -> Result<HarvestStats, HarvestError> {
        let config = &self.config;
        let start_time = std::time::Instant::now();

        let client = build_http_client(&config.http, &config.client)?;

        let refresher = TokenRefresher::new(client.clone(), Arc::clone(config));
        let credential = match refresher.ensure_fresh(&*self.store, config.account.id).await {
            Ok(credential) => Arc::new(credential),
            Err(e) => {
                tracing::error!("Aborting run: {}", e);
                return Err(e.into());
            }
        };

        let discovery = RangeDiscovery::new(
            client,
            SignedApi::new(Arc::clone(config)),
            config.scan.page_size,
            RetryPolicy::from_config(&config.http),
        );
        let discovered = discovery
            .discover_upper_bound(&credential, config.scan.fallback_end_id)
            .await;
        let upper_bound = bounded_upper_bound(&config.scan, discovered);

        let ids = build_id_set(&config.scan, upper_bound);
        tracing::info!(
            "Scanning {} IDs from {} through {} ({} ignored)",
            ids.len(),
            config.scan.start_id,
            upper_bound.saturating_add(config.scan.lookahead),
            config.scan.ignore.len()
        );

        let mut stats = HarvestStats::new(ids.len() as u64, upper_bound);

        let outcomes = ConcurrentFetcher::new(Arc::clone(config))
            .fetch_all(&ids, credential, config.scan.concurrency)
            .await?;

        for outcome in &outcomes {
            stats.record(outcome);
            if let FetchOutcome::Success(resource) = outcome {
                match self.persister.persist(resource) {
                    Ok(()) => stats.record_persist(true),
                    Err(e) => {
                        tracing::warn!("Failed to persist package {}: {}", resource.id, e);
                        stats.record_persist(false);
                    }
                }
            }
        }

        tracing::info!(
            "Harvest complete in {:.1}s: {} success, {} empty, {} failed, {} persisted",
            start_time.elapsed().as_secs_f64(),
            stats.succeeded,
            stats.empty,
            stats.failed,
            stats.persisted
        );

        Ok(stats)
    }
}

/// IDs to fetch for a discovered upper bound
///
/// The range runs from `start_id` through `upper_bound + lookahead`
/// inclusive, minus the ignore list. It is empty when the end falls below
/// the start.
pub fn build_id_set(scan: &ScanConfig, upper_bound: i64) -> BTreeSet<i64> {
    let end = upper_bound.saturating_add(scan.lookahead);
    let ignore: BTreeSet<i64> = scan.ignore.iter().copied().collect();

    (scan.start_id..=end)
        .filter(|id| !ignore.contains(id))
        .collect()
}

/// Discovered bound, or the fallback when it would exceed `max-range`
///
/// A remote reporting an absurd total must not turn into an ID set that
/// cannot be allocated.
pub fn bounded_upper_bound(scan: &ScanConfig, discovered: i64) -> i64 {
    let span = discovered
        .saturating_add(scan.lookahead)
        .saturating_sub(scan.start_id)
        .saturating_add(1);

    if span > scan.max_range {
        tracing::warn!(
            "Discovered bound {} spans {} IDs (max-range {}), using fallback {}",
            discovered,
            span,
            scan.max_range,
            scan.fallback_end_id
        );
        scan.fallback_end_id
    } else {
        discovered
    }
}
