//! Run statistics
//!
//! Counts are accumulated from fetch outcomes and persist results as the
//! run progresses, then printed once at the end.

use crate::model::FetchOutcome;
use crate::FetchError;
use std::collections::BTreeMap;

/// Harvest run statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStats {
    /// Number of IDs dispatched to the fetcher
    pub requested: u64,

    /// IDs that returned a resource
    pub succeeded: u64,

    /// IDs with no resource behind them
    pub empty: u64,

    /// IDs whose fetch failed
    pub failed: u64,

    /// Resources written by the persister
    pub persisted: u64,

    /// Resources the persister rejected
    pub persist_failed: u64,

    /// Upper bound the ID range was built from
    pub upper_bound: i64,

    /// Failure counts by kind (`transport`, `status`, `malformed`, `application`)
    pub failures_by_kind: BTreeMap<&'static str, u64>,
}

impl HarvestStats {
    pub fn new(requested: u64, upper_bound: i64) -> Self {
        Self {
            requested,
            upper_bound,
            ..Self::default()
        }
    }

    /// Counts one fetch outcome
    pub fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Success(_) => self.succeeded += 1,
            FetchOutcome::Empty { .. } => self.empty += 1,
            FetchOutcome::Failure { error, .. } => {
                self.failed += 1;
                *self.failures_by_kind.entry(failure_kind(error)).or_insert(0) += 1;
            }
        }
    }

    /// Counts one persist attempt
    pub fn record_persist(&mut self, ok: bool) {
        if ok {
            self.persisted += 1;
        } else {
            self.persist_failed += 1;
        }
    }

    /// Percentage of requested IDs that did not fail
    pub fn success_rate(&self) -> f64 {
        if self.requested == 0 {
            return 0.0;
        }
        ((self.succeeded + self.empty) as f64 / self.requested as f64) * 100.0
    }
}

fn failure_kind(error: &FetchError) -> &'static str {
    match error {
        FetchError::Transport { .. } => "transport",
        FetchError::Status(_) => "status",
        FetchError::Malformed(_) => "malformed",
        FetchError::Application { .. } => "application",
        FetchError::Worker(_) => "worker",
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStats) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Upper bound: {}", stats.upper_bound);
    println!("  IDs requested: {}", stats.requested);
    println!();

    println!("Outcomes:");
    println!("  Success: {}", stats.succeeded);
    println!("  Empty: {}", stats.empty);
    println!("  Failed: {}", stats.failed);
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("Failure Summary:");
        let mut kinds: Vec<_> = stats.failures_by_kind.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in kinds {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    println!("Persisted: {} ({} failed)", stats.persisted, stats.persist_failed);
    println!(
        "Success Rate: {:.1}% ({} / {} IDs resolved)",
        stats.success_rate(),
        stats.succeeded + stats.empty,
        stats.requested
    );
}
