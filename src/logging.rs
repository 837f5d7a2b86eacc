//! Tracing subscriber setup
//!
//! Logs go to stderr so that `--json` output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over the level passed on the command line.

use clap::ValueEnum;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Installs the global subscriber; fails if one is already installed
pub fn init(level: Level, format: LogFormat) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}
