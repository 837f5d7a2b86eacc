//! Pipeline configuration
//!
//! Holds the knobs shared by the fetcher, the adapters and the orchestrator.
//! Defaults mirror the production behaviour; the CLI overrides individual
//! fields.

use std::time::Duration;

use chrono::{Datelike, Utc};

use crate::data::{all_countries, Country};
use crate::providers::RetryPolicy;

/// Schema version of everything the pipeline caches
///
/// Bump this whenever an indicator is added or a cached shape changes so
/// that old entries are discarded on the next run.
pub const CACHE_VERSION: u32 = 3;

/// Year from which supplementary high-frequency sources override the base
pub const DEFAULT_RECENCY_CUTOFF: i32 = 2020;

/// First year requested from providers
pub const DEFAULT_START_YEAR: i32 = 1990;

/// Configuration for one pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// TTL for per-indicator entries and for the merged bundle
    pub cache_ttl: chrono::Duration,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Retry budget for transient provider errors
    pub retry: RetryPolicy,
    /// Pause between sequential per-country requests
    pub request_delay: Duration,
    /// Expected cache schema version
    pub cache_version: u32,
    /// Cutoff year used by the default catalog's override-recent steps
    pub recency_cutoff: i32,
    /// First year requested from providers
    pub start_year: i32,
    /// Last year requested from providers; later (projected) values are dropped
    pub end_year: i32,
    /// Countries included in every request
    pub countries: Vec<&'static Country>,
    /// FRED API key; FRED-backed supplements stay empty without one
    pub fred_api_key: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: chrono::Duration::hours(24),
            request_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            request_delay: Duration::from_millis(250),
            cache_version: CACHE_VERSION,
            recency_cutoff: DEFAULT_RECENCY_CUTOFF,
            start_year: DEFAULT_START_YEAR,
            end_year: Utc::now().year(),
            countries: all_countries().iter().collect(),
            fred_api_key: None,
        }
    }
}
