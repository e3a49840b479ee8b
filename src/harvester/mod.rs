//! Harvester module for signed-API enumeration
//!
//! This module contains the core harvesting logic, including:
//! - Signed request construction and response classification
//! - Upper-bound discovery from the paged listing
//! - Concurrent detail fetching with bounded retries
//! - Overall run coordination

pub(crate) mod client;
mod coordinator;
mod discovery;
mod fetcher;
mod parser;
mod retry;

pub use client::{build_http_client, current_timestamp, transport_error, ApiEnvelope, Endpoint, SignedApi};
pub use coordinator::{build_id_set, Harvester};
pub use discovery::RangeDiscovery;
pub use fetcher::{fetch_package, ConcurrentFetcher};
pub use parser::{normalize_url, parse_package, strip_brackets, RawEmote, RawPackage};
pub use retry::{RetryFailure, RetryPolicy};

use crate::config::Config;
use crate::credential::SqliteStore;
use crate::output::{HarvestStats, JsonDirPersister};
use crate::HarvestError;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Runs a complete harvest with the configured store and output directory
///
/// This is the main entry point for a run. It will:
/// 1. Open the credential store
/// 2. Refresh the account credential if it is stale
/// 3. Discover the current upper bound
/// 4. Fetch every ID in range and write each package to disk
pub async fn harvest(config: Config) -> Result<HarvestStats, HarvestError> {
    let store = SqliteStore::new(Path::new(&config.storage.database_path))?;
    let persister = JsonDirPersister::new(&config.output.directory);

    let harvester = Harvester::new(
        Arc::new(config),
        Arc::new(Mutex::new(store)),
        Arc::new(persister),
    );
    harvester.run().await
}
