//! Emote-Harvester main entry point
//!
//! This is the command-line interface for the emote package harvester.

use anyhow::Context;
use clap::Parser;
use emote_harvester::config::{load_config_with_hash, Config};
use emote_harvester::credential::{CredentialStore, SqliteStore};
use emote_harvester::harvester::{build_id_set, harvest};
use emote_harvester::output::print_statistics;
use emote_harvester::Credential;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Emote-Harvester: a signed-API emote package enumerator
///
/// Keeps the account credential fresh, discovers the current package range,
/// fetches every package concurrently and writes each one to disk as JSON.
#[derive(Parser, Debug)]
#[command(name = "emote-harvester")]
#[command(version = "1.0.0")]
#[command(about = "Enumerates emote packages from a signed content API", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the ID range without making any request
    #[arg(long, conflicts_with = "import_credential")]
    dry_run: bool,

    /// Store a credential from a JSON file and exit
    #[arg(long, value_name = "FILE", conflicts_with = "dry_run")]
    import_credential: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if let Some(path) = cli.import_credential.as_deref() {
        handle_import(&config, path)?;
    } else {
        handle_harvest(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("emote_harvester=info,warn"),
            1 => EnvFilter::new("emote_harvester=debug,info"),
            2 => EnvFilter::new("emote_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration and range
fn handle_dry_run(config: &Config) {
    println!("=== Emote-Harvester Dry Run ===\n");

    println!("Scan:");
    println!("  Start ID: {}", config.scan.start_id);
    println!("  Fallback end ID: {}", config.scan.fallback_end_id);
    println!("  Lookahead: {}", config.scan.lookahead);
    println!("  Workers: {}", config.scan.concurrency);
    println!("  Ignored IDs: {:?}", config.scan.ignore);

    println!("\nHTTP:");
    println!("  Timeout: {}ms", config.http.timeout_ms);
    println!(
        "  Attempts: {} ({}ms apart)",
        config.http.retry_attempts, config.http.retry_delay_ms
    );

    println!("\nEndpoints:");
    println!("  Listing: {}", config.api.listing_url());
    println!("  Detail: {}", config.api.detail_url());
    println!("  Refresh: {}", config.auth.refresh_url);

    println!("\nAccount: {}", config.account.id);
    println!("  Credential store: {}", config.storage.database_path);
    println!("  Output directory: {}", config.output.directory);

    let ids = build_id_set(&config.scan, config.scan.fallback_end_id);
    println!("\n✓ Configuration is valid");
    match (ids.first(), ids.last()) {
        (Some(first), Some(last)) => println!(
            "✓ Would fetch {} IDs ({} through {}) if discovery fell back",
            ids.len(),
            first,
            last
        ),
        _ => println!("✓ The fallback range is empty"),
    }
}

/// Handles the --import-credential mode: seeds the store from a JSON file
fn handle_import(config: &Config, path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let credential: Credential = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a credential", path.display()))?;

    let mut store = SqliteStore::new(Path::new(&config.storage.database_path))?;
    store.update(&credential)?;

    println!(
        "✓ Stored credential for account {} ({} cookies)",
        credential.account_id,
        credential.cookies.len()
    );
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting for account {} from ID {}",
        config.account.id,
        config.scan.start_id
    );

    match harvest(config).await {
        Ok(stats) => {
            print_statistics(&stats);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
