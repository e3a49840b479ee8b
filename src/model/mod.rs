//! Domain model for harvested resources
//!
//! # Components
//!
//! - `Resource`: a fetched emote package with its optional sub-items
//! - `SubItem`: one emote inside a package
//! - `FetchOutcome`: the tagged result of fetching one ID

mod outcome;
mod resource;

// Re-export main types
pub use outcome::FetchOutcome;
pub use resource::{Resource, SubItem};
