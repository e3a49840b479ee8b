/// Credential state definitions for the refresh lifecycle
///
/// A credential moves Fresh -> used as-is, or Stale -> Refreshing -> Fresh,
/// or Stale -> Refreshing -> Failed. Failed is terminal for the run.
use crate::credential::Credential;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Represents where a credential is in its refresh lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialState {
    /// Age is within the staleness threshold
    Fresh,

    /// Age exceeds the threshold; must be refreshed before use
    Stale,

    /// A refresh call is in flight
    Refreshing,

    /// The refresh failed; the run cannot continue
    Failed,
}

impl CredentialState {
    /// Classifies a stored credential by its age at `now`
    ///
    /// A credential exactly at the threshold is still fresh.
    pub fn classify(credential: &Credential, now: DateTime<Utc>, threshold: Duration) -> Self {
        if now - credential.last_refreshed > threshold {
            Self::Stale
        } else {
            Self::Fresh
        }
    }

    /// Returns true if the credential may be used without a refresh
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Fresh)
    }

    /// Checks whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: CredentialState) -> bool {
        matches!(
            (self, next),
            (Self::Stale, Self::Refreshing)
                | (Self::Refreshing, Self::Fresh)
                | (Self::Refreshing, Self::Failed)
        )
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Refreshing => "refreshing",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
