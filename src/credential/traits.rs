//! Credential store traits and error types
//!
//! This module defines the trait interfaces for the credential store and the
//! refresh audit log, plus the associated error types.

use crate::credential::Credential;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during credential store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt record for account {account_id}: {message}")]
    Corrupt { account_id: i64, message: String },

    #[error(
        "Refusing non-monotonic update for account {account_id}: {attempted} is not after {current}"
    )]
    NonMonotonic {
        account_id: i64,
        current: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One refresh attempt, as recorded in the audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshAuditEntry {
    pub account_id: i64,
    pub attempted_at: DateTime<Utc>,

    /// `success`, `rejected`, `malformed` or `transport`
    pub outcome: String,

    /// Raw response body, or the transport error text when none arrived
    pub response: String,
}

/// Persisted lookup and update of per-account credentials
///
/// Implementations must make `update` atomic: a concurrent `get` sees either
/// the old credential or the new one, never a mix of both.
pub trait CredentialStore {
    /// Gets the credential for an account, or None if none is stored
    fn get(&self, account_id: i64) -> StoreResult<Option<Credential>>;

    /// Replaces (or inserts) the credential for `credential.account_id`
    ///
    /// Fails with `StoreError::NonMonotonic` if `last_refreshed` is not later
    /// than the stored value.
    fn update(&mut self, credential: &Credential) -> StoreResult<()>;
}

/// Append-only record of refresh attempts
pub trait AuditLog {
    /// Appends one attempt
    fn append_refresh_attempt(&mut self, entry: &RefreshAuditEntry) -> StoreResult<()>;

    /// Lists attempts for an account, oldest first
    fn refresh_history(&self, account_id: i64) -> StoreResult<Vec<RefreshAuditEntry>>;
}
