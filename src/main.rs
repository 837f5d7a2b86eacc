//! econdash - fetch, merge and cache economic indicators
//!
//! Prints a per-indicator summary, or the full bundle as JSON, for the
//! countries selected on the command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::warn;

use econdash::cache::{CacheManager, CacheStore, FileStore, DEFAULT_ENTRY_LIMIT};
use econdash::catalog::Catalog;
use econdash::cli::{render_summary, Cli, CliError, Command};
use econdash::logging;
use econdash::orchestrator::Orchestrator;
use econdash::providers::ProviderRegistry;

/// Persistent cache in `dir`, or the platform cache directory when unset
fn build_cache(dir: Option<PathBuf>, ttl: chrono::Duration) -> CacheManager {
    let store: Option<Arc<dyn CacheStore>> = match dir {
        Some(dir) => Some(Arc::new(
            FileStore::with_dir(dir).with_entry_limit(DEFAULT_ENTRY_LIMIT),
        )),
        None => FileStore::new().map(|store| Arc::new(store) as Arc<dyn CacheStore>),
    };
    if store.is_none() {
        warn!("no cache directory available; caching in memory only");
    }
    CacheManager::new(store).with_default_ttl(ttl)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.pipeline_config()?;
    let cache = Arc::new(build_cache(cli.cache_dir.clone(), config.cache_ttl));
    let registry = ProviderRegistry::live(&config)?;
    let orchestrator = Orchestrator::new(
        cache,
        registry,
        Catalog::standard(config.recency_cutoff),
        &config,
    );

    match cli.command {
        Command::Fetch {
            force_refresh,
            json,
            indicator,
        } => {
            // Validate before touching the network
            if let Some(key) = &indicator {
                if !orchestrator.catalog().indicators.iter().any(|spec| &spec.key == key) {
                    return Err(CliError::UnknownIndicator(key.clone()).into());
                }
            }

            let bundle = orchestrator.fetch_bundle(force_refresh).await?;

            match (indicator, json) {
                (Some(key), true) => {
                    let series = bundle.get(&key).cloned().unwrap_or_default();
                    println!("{}", serde_json::to_string_pretty(&series)?);
                }
                (None, true) => println!("{}", serde_json::to_string_pretty(&bundle)?),
                (Some(key), false) => {
                    let mut only = bundle.clone();
                    only.indicators.retain(|k, _| k == &key);
                    print!("{}", render_summary(&only));
                }
                (None, false) => print!("{}", render_summary(&bundle)),
            }
        }
        Command::Status => match orchestrator.last_update_age() {
            Some(last) => println!("Last updated {}", last.human_readable),
            None => println!("No data fetched yet"),
        },
        Command::Clear { provider: None } => {
            orchestrator.clear_all();
            println!("Cache cleared");
        }
        Command::Clear {
            provider: Some(provider),
        } => {
            orchestrator.clear_provider(&provider)?;
            println!("Cache cleared for {provider}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init(cli.log_level, cli.log_format) {
        eprintln!("warning: {err}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
