use crate::model::Resource;
use crate::FetchError;

/// Result of fetching a single ID
///
/// `Empty` means the remote has no resource under this ID, which is not an
/// error. `Failure` means the fetch itself failed and the ID stays unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The resource was fetched and parsed
    Success(Resource),

    /// The ID does not correspond to an existing resource
    Empty { id: i64 },

    /// The fetch failed after any applicable retries
    Failure { id: i64, error: FetchError },
}

impl FetchOutcome {
    /// The ID this outcome belongs to
    pub fn id(&self) -> i64 {
        match self {
            Self::Success(resource) => resource.id,
            Self::Empty { id } | Self::Failure { id, .. } => *id,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }
}
