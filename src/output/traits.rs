//! Persister trait and error types
//!
//! A persister receives every successfully fetched resource exactly once.
//! Failures are reported back to the caller, which logs and counts them.

use crate::model::Resource;
use thiserror::Error;

/// Errors that can occur while persisting a resource
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for persist operations
pub type PersistResult<T> = Result<T, PersistError>;

/// Destination for fetched resources
///
/// Implementations must be thread-safe.
pub trait Persister: Send + Sync {
    /// Stores one resource
    fn persist(&self, resource: &Resource) -> PersistResult<()>;
}
