//! Command-line interface parsing for econdash
//!
//! Global options map onto [`PipelineConfig`]; subcommands pick what to do
//! with the pipeline once it is built.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::Level;

use crate::config::PipelineConfig;
use crate::data::{all_countries, country_by_id, country_by_iso2, country_by_iso3, Bundle, Country};
use crate::logging::LogFormat;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The country is not one of the tracked countries
    #[error("Unknown country: '{0}'. Use an id (USA, Japan), an ISO2 or an ISO3 code")]
    UnknownCountry(String),

    /// The indicator is not part of the bundle
    #[error("Unknown indicator: '{0}'")]
    UnknownIndicator(String),
}

/// econdash - fetch and merge economic indicators from several providers
#[derive(Parser, Debug)]
#[command(name = "econdash")]
#[command(about = "Multi-provider economic indicator fetcher with merge, fallback and cache")]
#[command(version)]
pub struct Cli {
    /// Minimum log level (RUST_LOG overrides it)
    #[arg(long, global = true, default_value = "warn", value_name = "LEVEL")]
    pub log_level: Level,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Directory for persisted cache entries (defaults to the platform cache dir)
    #[arg(long, global = true, env = "ECONDASH_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// FRED API key; central bank policy rates are skipped without one
    #[arg(long, global = true, env = "FRED_API_KEY", hide_env_values = true)]
    pub fred_api_key: Option<String>,

    /// Comma-separated countries to request (default: all tracked countries)
    ///
    /// Examples:
    ///   econdash fetch --countries USA,Japan
    ///   econdash fetch --countries gb,DEU
    #[arg(long, global = true, value_delimiter = ',', value_name = "LIST")]
    pub countries: Vec<String>,

    /// First year in which policy rates override the lending rate
    #[arg(long, global = true, value_name = "YEAR")]
    pub recency_cutoff: Option<i32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch the merged indicator bundle, from cache when fresh
    Fetch {
        /// Ignore cached entries and refetch every source
        #[arg(long)]
        force_refresh: bool,

        /// Print the bundle as JSON instead of a summary
        #[arg(long)]
        json: bool,

        /// Only output this indicator
        #[arg(long, value_name = "KEY")]
        indicator: Option<String>,
    },
    /// Show when data was last fetched successfully
    Status,
    /// Remove cached entries
    Clear {
        /// Only drop this provider's entries (worldbank, fred, imf)
        #[arg(long, value_name = "ID")]
        provider: Option<String>,
    },
}

/// Resolves country arguments; an empty list means every tracked country
///
/// Matching is case-insensitive against the id, ISO2 and ISO3 codes.
/// Duplicates are dropped, first occurrence wins.
pub fn parse_country_list(args: &[String]) -> Result<Vec<&'static Country>, CliError> {
    if args.is_empty() {
        return Ok(all_countries().iter().collect());
    }

    let mut seen = BTreeSet::new();
    let mut countries = Vec::new();
    for arg in args {
        let arg = arg.trim();
        if arg.is_empty() {
            continue;
        }
        let country = country_by_id(arg)
            .or_else(|| country_by_iso3(arg))
            .or_else(|| country_by_iso2(arg))
            .ok_or_else(|| CliError::UnknownCountry(arg.to_string()))?;
        if seen.insert(country.id) {
            countries.push(country);
        }
    }
    Ok(countries)
}

impl Cli {
    /// Builds the pipeline configuration from defaults plus CLI overrides
    pub fn pipeline_config(&self) -> Result<PipelineConfig, CliError> {
        let mut config = PipelineConfig {
            countries: parse_country_list(&self.countries)?,
            fred_api_key: self.fred_api_key.clone().filter(|key| !key.is_empty()),
            ..Default::default()
        };
        if let Some(cutoff) = self.recency_cutoff {
            config.recency_cutoff = cutoff;
        }
        Ok(config)
    }
}

/// One line per indicator: observations and covered years
pub fn render_summary(bundle: &Bundle) -> String {
    let width = bundle
        .indicators
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (key, series) in &bundle.indicators {
        let years = match series.year_range() {
            Some((first, last)) => format!("{first}-{last}"),
            None => "no data".to_string(),
        };
        let _ = writeln!(
            out,
            "{key:<width$}  {:>6} obs  {years}",
            series.observation_count()
        );
    }
    let _ = writeln!(
        out,
        "{} of {} indicators populated, fetched {}",
        bundle.populated_count(),
        bundle.indicators.len(),
        bundle.fetched_at.format("%Y-%m-%d %H:%M UTC")
    );
    out
}
