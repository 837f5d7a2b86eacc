//! Aggregate orchestrator
//!
//! Fans out every primary-indicator fetch and every supplementary-source
//! fetch at once, waits for all of them to settle, then runs the merge chains
//! and caches the assembled [`Bundle`] as one unit.
//!
//! Individual fetch failures degrade to empty series. Only a failure while
//! assembling the bundle is fatal, and even then a previously cached bundle
//! (expired or not) is served instead when one exists.
//!
//! Two overlapping refreshes both write the cache; the last writer wins.
//! Callers that need strict ordering should not trigger a refresh while one
//! is in flight.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::CacheManager;
use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::data::{Bundle, Country, CountrySeries, SeriesError};
use crate::fetcher::{FetchOutcome, FetchStatus, IndicatorFetcher};
use crate::merge::{apply_chain, MergeError};
use crate::providers::{ProviderError, ProviderRegistry};

/// Cache key holding the whole merged bundle
pub const BUNDLE_CACHE_KEY: &str = "econ_bundle";

/// Cache key holding the time of the last successful bundle assembly
pub const LAST_FETCH_KEY: &str = "last_successful_fetch";

/// Problems that make a bundle impossible to assemble
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("merge chain targets unknown indicator '{0}'")]
    UnknownIndicator(String),

    #[error("indicator '{indicator}' produced an invalid series: {reason}")]
    InvalidSeries {
        indicator: String,
        reason: SeriesError,
    },
}

/// The only error `fetch_bundle` surfaces
///
/// Its message is deliberately generic; the underlying cause is logged and
/// available through `source()`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not load data, please retry")]
    Unavailable(#[source] AssemblyError),
}

/// Age of the last successful fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastUpdate {
    pub age: Duration,
    pub human_readable: String,
}

/// Fetches, merges and caches the indicator bundle
#[derive(Debug)]
pub struct Orchestrator {
    cache: Arc<CacheManager>,
    registry: ProviderRegistry,
    catalog: Catalog,
    fetcher: IndicatorFetcher,
    countries: Vec<&'static Country>,
    cache_version: u32,
    bundle_ttl: Duration,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<CacheManager>,
        registry: ProviderRegistry,
        catalog: Catalog,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            fetcher: IndicatorFetcher::new(cache.clone(), config.cache_ttl),
            cache,
            registry,
            catalog,
            countries: config.countries.clone(),
            cache_version: config.cache_version,
            bundle_ttl: config.cache_ttl,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the indicator bundle
    ///
    /// Served from cache when a fresh bundle exists and `force_refresh` is
    /// false. Otherwise every source is fetched (bypassing per-indicator
    /// cache reads when forced) and the result is written back.
    pub async fn fetch_bundle(&self, force_refresh: bool) -> Result<Bundle, PipelineError> {
        if self.cache.ensure_version(self.cache_version) {
            debug!(version = self.cache_version, "cache reset to current version");
        }

        let cached = match self.cache.read::<Bundle>(BUNDLE_CACHE_KEY) {
            Some(cached) if !force_refresh && !cached.is_expired => {
                debug!(cached_at = %cached.cached_at, "bundle served from cache");
                return Ok(cached.data);
            }
            other => other,
        };

        match self.refresh(force_refresh).await {
            Ok(bundle) => Ok(bundle),
            Err(err) => {
                error!(error = %err, "bundle assembly failed");
                match cached {
                    Some(stale) => {
                        warn!(
                            cached_at = %stale.cached_at,
                            expired = stale.is_expired,
                            "serving previously cached bundle"
                        );
                        Ok(stale.data)
                    }
                    None => Err(PipelineError::Unavailable(err)),
                }
            }
        }
    }

    async fn refresh(&self, force_refresh: bool) -> Result<Bundle, AssemblyError> {
        let primary = join_all(
            self.catalog
                .indicators
                .iter()
                .map(|spec| self.fetch_one(&spec.provider, &spec.code, force_refresh)),
        );
        let supplementary = join_all(
            self.catalog
                .supplements
                .iter()
                .map(|spec| self.fetch_one(&spec.provider, &spec.code, force_refresh)),
        );
        let (primary, supplementary) = futures::join!(primary, supplementary);

        log_batch(
            "primary",
            self.catalog.indicators.iter().map(|s| s.key.as_str()),
            &primary,
        );
        log_batch(
            "supplementary",
            self.catalog.supplements.iter().map(|s| s.name.as_str()),
            &supplementary,
        );

        let sources: HashMap<String, CountrySeries> = self
            .catalog
            .supplements
            .iter()
            .zip(supplementary)
            .map(|(spec, outcome)| (spec.name.clone(), outcome.series.to_country_series()))
            .collect();

        let bundle = self.assemble(primary, &sources)?;

        self.cache.set(BUNDLE_CACHE_KEY, &bundle, Some(self.bundle_ttl));
        self.cache
            .set(LAST_FETCH_KEY, &bundle.fetched_at, Some(Duration::days(3650)));
        self.cache.store_version(self.cache_version);

        info!(
            indicators = bundle.indicators.len(),
            populated = bundle.populated_count(),
            "bundle assembled"
        );
        Ok(bundle)
    }

    async fn fetch_one(&self, provider_id: &str, code: &str, force_refresh: bool) -> FetchOutcome {
        let Some(provider) = self.registry.get(provider_id) else {
            let err = ProviderError::UnknownProvider(provider_id.to_string());
            warn!(code, error = %err, "skipping indicator");
            return FetchOutcome::failed(err.to_string());
        };
        self.fetcher
            .fetch(provider.as_ref(), code, &self.countries, force_refresh)
            .await
    }

    /// Runs every indicator's merge chain; all fetches have settled by now
    fn assemble(
        &self,
        primary: Vec<FetchOutcome>,
        sources: &HashMap<String, CountrySeries>,
    ) -> Result<Bundle, AssemblyError> {
        if let Some(orphan) = self.catalog.orphan_chains().next() {
            return Err(AssemblyError::UnknownIndicator(orphan.indicator.clone()));
        }

        let mut indicators = BTreeMap::new();
        for (spec, outcome) in self.catalog.indicators.iter().zip(primary) {
            let merged = apply_chain(outcome.series, self.catalog.chain_for(&spec.key), sources)?;
            merged
                .validate()
                .map_err(|reason| AssemblyError::InvalidSeries {
                    indicator: spec.key.clone(),
                    reason,
                })?;
            indicators.insert(spec.key.clone(), merged);
        }

        Ok(Bundle {
            indicators,
            fetched_at: Utc::now(),
        })
    }

    /// Drops every cached entry, per-indicator and bundle alike
    pub fn clear_all(&self) {
        self.cache.clear();
        info!("cache cleared");
    }

    /// Drops one provider's cached indicators and the bundle built from them
    ///
    /// The next `fetch_bundle` refetches that provider and reassembles; other
    /// providers are still served from cache.
    pub fn clear_provider(&self, provider_id: &str) -> Result<(), ProviderError> {
        if self.registry.get(provider_id).is_none() {
            return Err(ProviderError::UnknownProvider(provider_id.to_string()));
        }
        self.cache
            .clear_prefix(&IndicatorFetcher::cache_key(provider_id, ""));
        self.cache.delete(BUNDLE_CACHE_KEY);
        info!(provider = provider_id, "provider cache cleared");
        Ok(())
    }

    /// Time since the last successful bundle assembly, if there was one
    pub fn last_update_age(&self) -> Option<LastUpdate> {
        let last = self.cache.read::<DateTime<Utc>>(LAST_FETCH_KEY)?;
        let age = Utc::now() - last.data;
        Some(LastUpdate {
            age,
            human_readable: humanize_age(age),
        })
    }
}

fn log_batch<'a>(
    batch: &str,
    labels: impl Iterator<Item = &'a str>,
    outcomes: &[FetchOutcome],
) {
    let mut cached = 0;
    let mut fresh = 0;
    let mut failed = Vec::new();
    for (label, outcome) in labels.zip(outcomes) {
        match &outcome.status {
            FetchStatus::Cached => cached += 1,
            FetchStatus::Fresh => fresh += 1,
            FetchStatus::Failed(_) => failed.push(label),
        }
    }

    info!(batch, cached, fresh, failed = failed.len(), "fetch batch settled");
    if !failed.is_empty() {
        warn!(batch, ?failed, "some sources failed and were left empty");
    }
}

/// Formats an age as "just now", "5 minutes ago", "2 hours ago", "3 days ago"
pub fn humanize_age(age: Duration) -> String {
    fn plural(n: i64, unit: &str) -> String {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    }

    if age < Duration::minutes(1) {
        "just now".to_string()
    } else if age < Duration::hours(1) {
        plural(age.num_minutes(), "minute")
    } else if age < Duration::days(1) {
        plural(age.num_hours(), "hour")
    } else {
        plural(age.num_days(), "day")
    }
}
