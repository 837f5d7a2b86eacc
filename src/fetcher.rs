//! Per-indicator fetcher
//!
//! Wraps a single provider call with a cache read before and a cache write
//! after. A failed call never propagates: it degrades to an empty series and
//! the failure is reported through [`FetchStatus`] for the batch summary.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use crate::cache::CacheManager;
use crate::data::{Country, Series};
use crate::providers::Provider;

/// How a fetch was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Served from a valid cache entry
    Cached,
    /// Fetched from the provider and written back to the cache
    Fresh,
    /// The provider failed; the series is empty
    Failed(String),
}

/// Series plus how it was obtained
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub series: Series,
    pub status: FetchStatus,
}

impl FetchOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            series: Series::new(),
            status: FetchStatus::Failed(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FetchStatus::Failed(_))
    }
}

/// Cache-aware wrapper around provider calls
#[derive(Debug, Clone)]
pub struct IndicatorFetcher {
    cache: Arc<CacheManager>,
    ttl: Duration,
}

impl IndicatorFetcher {
    pub fn new(cache: Arc<CacheManager>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Cache key for one provider indicator: `<provider>_<code>`
    pub fn cache_key(provider: &str, code: &str) -> String {
        format!("{provider}_{code}")
    }

    /// Fetches `code` from `provider`, honouring the cache unless `force_refresh`
    ///
    /// Fresh results are always written back, including on a forced refresh.
    /// Failed fetches are not cached so the next run tries again.
    pub async fn fetch(
        &self,
        provider: &dyn Provider,
        code: &str,
        countries: &[&'static Country],
        force_refresh: bool,
    ) -> FetchOutcome {
        let key = Self::cache_key(provider.id(), code);

        if !force_refresh {
            if let Some(series) = self.cache.get::<Series>(&key) {
                debug!(key, "indicator served from cache");
                return FetchOutcome {
                    series,
                    status: FetchStatus::Cached,
                };
            }
        }

        match provider.fetch_series(code, countries).await {
            Ok(series) => {
                self.cache.set(&key, &series, Some(self.ttl));
                FetchOutcome {
                    series,
                    status: FetchStatus::Fresh,
                }
            }
            Err(err) => {
                warn!(key, error = %err, "indicator fetch failed; using empty series");
                FetchOutcome::failed(err.to_string())
            }
        }
    }
}
