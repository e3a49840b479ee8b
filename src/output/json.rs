//! One-file-per-resource JSON output
//!
//! Files are named `{id}-{text}.json`, where `text` is the display text with
//! characters that cannot appear in a file name replaced by `_`.

use crate::model::Resource;
use crate::output::traits::{PersistResult, Persister};
use std::fs;
use std::path::PathBuf;

/// Writes each resource as pretty-printed UTF-8 JSON into a directory
pub struct JsonDirPersister {
    directory: PathBuf,
}

impl JsonDirPersister {
    /// Creates a persister rooted at `directory`
    ///
    /// The directory is created on first write if it does not exist.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Full path the resource would be written to
    pub fn path_for(&self, resource: &Resource) -> PathBuf {
        self.directory.join(file_name(resource))
    }
}

impl Persister for JsonDirPersister {
    fn persist(&self, resource: &Resource) -> PersistResult<()> {
        fs::create_dir_all(&self.directory)?;

        let path = self.path_for(resource);
        let body = serde_json::to_string_pretty(resource)?;
        fs::write(&path, body)?;

        tracing::debug!("Wrote package {} to {}", resource.id, path.display());
        Ok(())
    }
}

/// File name for a resource
pub fn file_name(resource: &Resource) -> String {
    format!("{}-{}.json", resource.id, sanitize(&resource.display_text))
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
