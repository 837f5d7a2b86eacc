//! IMF DataMapper adapter
//!
//! The DataMapper API answers `values.<INDICATOR>.<ISO3>.<year>` for a batch
//! of countries in one request. It also publishes projections; anything
//! after the configured end year is dropped.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::{HttpClient, Provider, ProviderError};
use crate::data::{country_by_iso3, Country, Series};

/// Base URL for the IMF DataMapper API
const IMF_BASE_URL: &str = "https://www.imf.org/external/datamapper/api/v1";

/// Client for the IMF DataMapper API
#[derive(Debug, Clone)]
pub struct ImfProvider {
    http: HttpClient,
    base_url: String,
    start_year: i32,
    end_year: i32,
}

impl ImfProvider {
    pub fn new(http: HttpClient, start_year: i32, end_year: i32) -> Self {
        Self {
            http,
            base_url: IMF_BASE_URL.to_string(),
            start_year,
            end_year,
        }
    }

    /// Points the adapter at a different host (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn indicator_url(&self, code: &str, countries: &[&'static Country]) -> String {
        let codes: Vec<&str> = countries.iter().map(|c| c.iso3).collect();
        format!("{}/{}/{}", self.base_url, code, codes.join("/"))
    }

    /// Extracts `(country, year, value)` triples within the year window
    fn parse_values(
        &self,
        code: &str,
        body: &Value,
    ) -> Result<Vec<(String, i32, f64)>, ProviderError> {
        let Some(values) = body.get("values") else {
            // DataMapper omits "values" entirely when nothing matched
            return Ok(Vec::new());
        };
        let Some(by_country) = values.get(code).and_then(Value::as_object) else {
            return Err(ProviderError::Parse(format!(
                "IMF response has no table for {code}"
            )));
        };

        let mut triples = Vec::new();
        for (iso3, years) in by_country {
            let Some(country) = country_by_iso3(iso3) else {
                warn!(code = %iso3, "dropping unmapped IMF country code");
                continue;
            };
            let Some(years) = years.as_object() else {
                continue;
            };
            for (year, value) in years {
                let (Ok(year), Some(value)) = (year.parse::<i32>(), value.as_f64()) else {
                    continue;
                };
                if year < self.start_year || year > self.end_year || !value.is_finite() {
                    continue;
                }
                triples.push((country.id.to_string(), year, value));
            }
        }
        Ok(triples)
    }
}

#[async_trait]
impl Provider for ImfProvider {
    fn id(&self) -> &str {
        "imf"
    }

    async fn fetch_series(
        &self,
        code: &str,
        countries: &[&'static Country],
    ) -> Result<Series, ProviderError> {
        if countries.is_empty() {
            return Ok(Series::new());
        }
        let body: Value = self.http.get_json(&self.indicator_url(code, countries)).await?;
        Ok(Series::from_triples(self.parse_values(code, &body)?))
    }
}
