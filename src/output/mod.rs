//! Output module for fetched resources and run statistics
//!
//! This module handles:
//! - Persisting each fetched resource (`Persister`, `JsonDirPersister`)
//! - Accumulating and printing run statistics

mod json;
pub mod stats;
mod traits;

pub use json::{file_name, JsonDirPersister};
pub use stats::{print_statistics, HarvestStats};
pub use traits::{PersistError, PersistResult, Persister};
