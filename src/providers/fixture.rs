//! In-memory provider serving canned series
//!
//! Used to exercise the fetcher and orchestrator without a network: series
//! can be made to fail or to arrive after a delay, and every call is counted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{Provider, ProviderError};
use crate::data::{Country, Series};

/// Provider that answers from a fixed table of series
#[derive(Debug, Default)]
pub struct FixtureProvider {
    id: String,
    series: BTreeMap<String, Series>,
    failing: BTreeSet<String>,
    delays: BTreeMap<String, Duration>,
    calls: AtomicUsize,
}

impl FixtureProvider {
    /// Creates an empty fixture registered under `id`
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Serves `series` for indicator `code`
    pub fn with_series(mut self, code: impl Into<String>, series: Series) -> Self {
        self.series.insert(code.into(), series);
        self
    }

    /// Makes every request for `code` fail with a 503
    pub fn failing(mut self, code: impl Into<String>) -> Self {
        self.failing.insert(code.into());
        self
    }

    /// Delays responses for `code`
    pub fn with_delay(mut self, code: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(code.into(), delay);
        self
    }

    /// Number of `fetch_series` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FixtureProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_series(
        &self,
        code: &str,
        countries: &[&'static Country],
    ) -> Result<Series, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(code) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(code) {
            return Err(ProviderError::Server {
                status: 503,
                url: format!("fixture://{}/{code}", self.id),
            });
        }
        let Some(series) = self.series.get(code) else {
            return Err(ProviderError::Client {
                status: 404,
                url: format!("fixture://{}/{code}", self.id),
            });
        };

        let wanted: BTreeSet<&str> = countries.iter().map(|c| c.id).collect();
        Ok(Series::from_records(series.records().iter().map(|record| {
            let mut record = record.clone();
            record.values.retain(|country, _| wanted.contains(country.as_str()));
            record
        })))
    }
}
