//! Credential lifecycle
//!
//! This module owns everything about the account session material:
//! - The `Credential` value and its cookie set
//! - Staleness classification (`CredentialState`)
//! - Persistent storage with atomic updates (`CredentialStore`, `SqliteStore`)
//! - The append-only refresh audit log (`AuditLog`)
//! - Token refresh against the remote auth endpoint (`TokenRefresher`)

mod refresher;
mod schema;
mod sqlite;
mod state;
mod traits;

pub use refresher::TokenRefresher;
pub use sqlite::SqliteStore;
pub use state::CredentialState;
pub use traits::{AuditLog, CredentialStore, RefreshAuditEntry, StoreError, StoreResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Session material for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub account_id: i64,
    pub access_token: String,
    pub refresh_token: String,

    /// Cookies in the order the auth endpoint returned them
    #[serde(default)]
    pub cookies: Vec<Cookie>,

    pub last_refreshed: DateTime<Utc>,
}

impl Credential {
    /// Renders the cookie set as a `Cookie` header value
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::Utc;
    /// use emote_harvester::credential::{Cookie, Credential};
    ///
    /// let credential = Credential {
    ///     account_id: 1,
    ///     access_token: "a".to_string(),
    ///     refresh_token: "r".to_string(),
    ///     cookies: vec![Cookie::new("SESSDATA", "x"), Cookie::new("bili_jct", "y")],
    ///     last_refreshed: Utc::now(),
    /// };
    /// assert_eq!(credential.cookie_header(), "SESSDATA=x;bili_jct=y");
    /// ```
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join(";")
    }
}
