//! Configuration module for Emote-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The resulting [`Config`] is immutable and shared by reference for a whole run.
//!
//! # Example
//!
//! ```no_run
//! use emote_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Scanning from ID {}", config.scan.start_id);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AccountConfig, ApiConfig, AuthConfig, ClientProfile, Config, HttpConfig, OutputConfig,
    ScanConfig, StorageConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
