//! FRED (Federal Reserve Economic Data) adapter
//!
//! Serves central bank policy rates. FRED has one series per country, so the
//! adapter issues one request per distinct series with a short pause between
//! requests, and averages observations into annual values.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{HttpClient, Provider, ProviderError};
use crate::data::{Country, Series};

/// Base URL for the FRED API
const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Indicator code served by this adapter
pub const POLICY_RATE_CODE: &str = "policy_rate";

/// FRED observations response
#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<FredObservation>,
}

/// A single FRED observation; missing values are reported as "."
#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

/// Client for FRED series observations
#[derive(Debug, Clone)]
pub struct FredProvider {
    http: HttpClient,
    api_key: Option<String>,
    base_url: String,
    start_year: i32,
    request_delay: Duration,
}

impl FredProvider {
    pub fn new(
        http: HttpClient,
        api_key: Option<String>,
        start_year: i32,
        request_delay: Duration,
    ) -> Self {
        Self {
            http,
            api_key,
            base_url: FRED_BASE_URL.to_string(),
            start_year,
            request_delay,
        }
    }

    /// Points the adapter at a different host (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn observations_url(&self, series_id: &str, api_key: &str) -> String {
        format!(
            "{}/series/observations?series_id={}&api_key={}&file_type=json\
             &frequency=a&aggregation_method=avg&observation_start={}-01-01",
            self.base_url, series_id, api_key, self.start_year
        )
    }

    async fn fetch_annual(
        &self,
        series_id: &str,
        api_key: &str,
    ) -> Result<Vec<(i32, f64)>, ProviderError> {
        let response: ObservationsResponse = self
            .http
            .get_json(&self.observations_url(series_id, api_key))
            .await?;
        Ok(annual_averages(&response.observations))
    }
}

#[async_trait]
impl Provider for FredProvider {
    fn id(&self) -> &str {
        "fred"
    }

    async fn fetch_series(
        &self,
        code: &str,
        countries: &[&'static Country],
    ) -> Result<Series, ProviderError> {
        if code != POLICY_RATE_CODE {
            return Err(ProviderError::UnsupportedIndicator {
                provider: self.id().to_string(),
                code: code.to_string(),
            });
        }
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("FRED API key not configured; policy rates unavailable");
            return Ok(Series::new());
        };

        // Several countries can share one series (e.g. the ECB rate)
        let mut by_series: BTreeMap<&str, Vec<&'static str>> = BTreeMap::new();
        for country in countries {
            match country.fred_policy_rate {
                Some(series_id) => by_series.entry(series_id).or_default().push(country.id),
                None => debug!(country = country.id, "no FRED policy rate series"),
            }
        }

        let mut triples = Vec::new();
        let mut succeeded = 0;
        let mut last_error = None;
        for (index, (series_id, country_ids)) in by_series.iter().enumerate() {
            if index > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            match self.fetch_annual(series_id, api_key).await {
                Ok(points) => {
                    succeeded += 1;
                    for country in country_ids {
                        triples.extend(
                            points
                                .iter()
                                .map(|&(year, value)| (country.to_string(), year, value)),
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        series_id,
                        countries = ?country_ids,
                        error = %err,
                        "FRED series fetch failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        // Every series failed
        match last_error {
            Some(err) if succeeded == 0 => Err(err),
            _ => Ok(Series::from_triples(triples)),
        }
    }
}

/// Groups observations by calendar year and averages them
///
/// Values FRED reports as "." (missing) or that don't parse are skipped.
fn annual_averages(observations: &[FredObservation]) -> Vec<(i32, f64)> {
    let mut sums: BTreeMap<i32, (f64, u32)> = BTreeMap::new();
    for obs in observations {
        let Some(year) = obs.date.get(..4).and_then(|y| y.parse::<i32>().ok()) else {
            continue;
        };
        let Ok(value) = obs.value.trim().parse::<f64>() else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }
        let slot = sums.entry(year).or_insert((0.0, 0));
        slot.0 += value;
        slot.1 += 1;
    }
    sums.into_iter()
        .map(|(year, (sum, count))| (year, sum / f64::from(count)))
        .collect()
}
