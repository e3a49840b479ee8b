//! Upper-bound discovery via a two-page listing probe
//!
//! Page 1 reports the total package count; the last page is computed from it
//! and fetched too. The bound is the largest ID seen on either page, because
//! page 1 can hold packages published after the total was computed.
//!
//! Discovery is best-effort: any failure yields the configured fallback.

use crate::credential::Credential;
use crate::harvester::client::{current_timestamp, Endpoint, SignedApi};
use crate::harvester::parser::{max_listed_id, ListingData};
use crate::harvester::retry::{RetryFailure, RetryPolicy};
use crate::FetchError;
use reqwest::Client;

/// Determines the current maximum valid package ID
pub struct RangeDiscovery {
    client: Client,
    api: SignedApi,
    page_size: u32,
    retry: RetryPolicy,
}

impl RangeDiscovery {
    pub fn new(client: Client, api: SignedApi, page_size: u32, retry: RetryPolicy) -> Self {
        Self {
            client,
            api,
            page_size: page_size.max(1),
            retry,
        }
    }

    /// Index of the last listing page for `total` items
    ///
    /// Mirrors the remote pager, which is 1-based and rounds down before
    /// adding one. Saturates at `u32::MAX` for totals no pager could reach.
    pub fn last_page(total: i64, page_size: u32) -> u32 {
        let total = u64::try_from(total).unwrap_or(0);
        u32::try_from(total / u64::from(page_size.max(1)) + 1).unwrap_or(u32::MAX)
    }

    /// Returns the discovered upper bound, or `fallback` if either probe fails
    pub async fn discover_upper_bound(&self, credential: &Credential, fallback: i64) -> i64 {
        match self.probe(credential).await {
            Ok(bound) => {
                tracing::info!("Discovered upper bound: {}", bound);
                bound
            }
            Err(e) => {
                tracing::warn!(
                    "Range discovery degraded, using configured bound {}: {}",
                    fallback,
                    e
                );
                fallback
            }
        }
    }

    async fn probe(&self, credential: &Credential) -> Result<i64, FetchError> {
        let first = self.fetch_page(credential, 1).await?;
        let first_max = max_listed_id(&first);

        let last_page = Self::last_page(first.total, self.page_size);
        tracing::debug!(
            "Listing reports {} packages, probing page {}",
            first.total,
            last_page
        );

        let last = self.fetch_page(credential, last_page).await?;
        let last_max = max_listed_id(&last);

        first_max
            .into_iter()
            .chain(last_max)
            .max()
            .ok_or_else(|| FetchError::Malformed("both probed pages are empty".to_string()))
    }

    async fn fetch_page(&self, credential: &Credential, page: u32) -> Result<ListingData, FetchError> {
        let headers = self.api.headers(credential, Endpoint::Listing, None);

        let envelope = self
            .retry
            .run(
                &format!("Listing page {}", page),
                |_| {
                    // Re-signed per attempt so the timestamp keeps advancing
                    let signed =
                        self.api
                            .listing_request(credential, page, self.page_size, current_timestamp());
                    let headers = headers.clone();
                    async move {
                        self.api
                            .get::<ListingData>(&self.client, Endpoint::Listing, &signed, headers)
                            .await
                    }
                },
                FetchError::is_transport,
            )
            .await
            .map_err(RetryFailure::into_fetch_error)?;

        let data = envelope
            .into_data()?
            .ok_or_else(|| FetchError::Malformed(format!("page {} has no data", page)))?;

        if data.packages.is_none() {
            return Err(FetchError::Malformed(format!(
                "page {} has no packages",
                page
            )));
        }

        Ok(data)
    }
}
