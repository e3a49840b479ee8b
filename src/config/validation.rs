use crate::config::types::{
    ApiConfig, AuthConfig, Config, HttpConfig, OutputConfig, ScanConfig, StorageConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Only the shape is checked here. Whether the keys or endpoints actually
/// work is discovered at run time.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scan_config(&config.scan)?;
    validate_http_config(&config.http)?;
    validate_api_config(&config.api)?;
    validate_auth_config(&config.auth)?;
    validate_storage_config(&config.storage)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates scan range and pool configuration
fn validate_scan_config(config: &ScanConfig) -> Result<(), ConfigError> {
    if config.start_id < 0 {
        return Err(ConfigError::Validation(format!(
            "start-id must be >= 0, got {}",
            config.start_id
        )));
    }

    if config.fallback_end_id < config.start_id {
        return Err(ConfigError::Validation(format!(
            "fallback-end-id ({}) must be >= start-id ({})",
            config.fallback_end_id, config.start_id
        )));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "page-size must be >= 1".to_string(),
        ));
    }

    if config.lookahead < 0 {
        return Err(ConfigError::Validation(format!(
            "lookahead must be >= 0, got {}",
            config.lookahead
        )));
    }

    if config.concurrency < 1 || config.concurrency > 200 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 200, got {}",
            config.concurrency
        )));
    }

    if config.max_range < 1 {
        return Err(ConfigError::Validation(format!(
            "max-range must be >= 1, got {}",
            config.max_range
        )));
    }

    let fallback_span = (config.fallback_end_id - config.start_id)
        .saturating_add(1)
        .saturating_add(config.lookahead);
    if fallback_span > config.max_range {
        return Err(ConfigError::Validation(format!(
            "fallback range spans {} IDs, more than max-range ({})",
            fallback_span, config.max_range
        )));
    }

    Ok(())
}

/// Validates network configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "timeout-ms must be >= 1".to_string(),
        ));
    }

    if config.retry_attempts < 1 {
        return Err(ConfigError::Validation(
            "retry-attempts must be >= 1".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        validate_http_url("proxy", proxy)?;
    }

    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;
    require_non_empty("api.app-key", &config.app_key)?;
    require_non_empty("api.app-secret", &config.app_secret)?;

    for (name, path) in [
        ("listing-path", &config.listing_path),
        ("detail-path", &config.detail_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "{} must start with '/', got '{}'",
                name, path
            )));
        }
    }

    Ok(())
}

fn validate_auth_config(config: &AuthConfig) -> Result<(), ConfigError> {
    validate_http_url("refresh-url", &config.refresh_url)?;
    require_non_empty("auth.app-key", &config.app_key)?;
    require_non_empty("auth.app-secret", &config.app_secret)?;

    if config.stale_after_days < 1 {
        return Err(ConfigError::Validation(format!(
            "stale-after-days must be >= 1, got {}",
            config.stale_after_days
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    require_non_empty("database-path", &config.database_path)
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    require_non_empty("output.directory", &config.directory)
}

/// Validates that a URL parses and uses an HTTP scheme
fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name,
            url.scheme()
        )));
    }

    Ok(())
}

fn require_non_empty(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }
    Ok(())
}
