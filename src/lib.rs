//! Emote-Harvester: a signed-API resource enumerator
//!
//! This crate enumerates emote packages exposed by a remote content API that
//! requires per-request signing and a rotating session credential. It keeps the
//! credential fresh, discovers the current ID range, fetches every package
//! concurrently with bounded retries, and hands results to a persister.

pub mod config;
pub mod credential;
pub mod harvester;
pub mod model;
pub mod output;
pub mod sign;

use thiserror::Error;

/// Main error type for Emote-Harvester operations
///
/// Only fatal conditions surface here. Per-item fetch failures are contained
/// in [`model::FetchOutcome`] and reported through run statistics.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Storage error: {0}")]
    Storage(#[from] credential::StoreError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Credential lifecycle errors
///
/// Every variant is fatal for a run: a refresh failure means the stored
/// tokens were revoked or are invalid, which retrying cannot fix.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No credential stored for account {0}")]
    NotFound(i64),

    #[error("Refresh request for account {account_id} failed: {message}")]
    Transport { account_id: i64, message: String },

    #[error("Malformed refresh response for account {account_id}: {message}")]
    Malformed { account_id: i64, message: String },

    #[error("Refresh rejected for account {account_id} (code {code}): {message}")]
    Rejected {
        account_id: i64,
        code: i64,
        message: String,
    },

    #[error("Credential store error: {0}")]
    Store(#[from] credential::StoreError),
}

/// Per-item fetch errors
///
/// These never abort a run. They are carried inside a failed
/// [`model::FetchOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("remote error code {code}: {message}")]
    Application { code: i64, message: String },

    #[error("fetch worker stopped before reporting: {0}")]
    Worker(String),
}

impl FetchError {
    /// Returns true if the failure happened below HTTP and may succeed on retry
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Result type alias for Emote-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use credential::{Credential, CredentialState};
pub use harvester::Harvester;
pub use model::{FetchOutcome, Resource, SubItem};
pub use sign::{sign, ParamValue, SignedRequest};
