//! World Bank indicators API adapter
//!
//! Fetches annual indicator values from the World Bank v2 JSON API. Countries
//! are batched into a single `;`-separated request; the response is paged.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{HttpClient, Provider, ProviderError};
use crate::data::{country_by_iso2, country_by_iso3, Country, Series};

/// Base URL for the World Bank API
const WORLD_BANK_BASE_URL: &str = "https://api.worldbank.org/v2";

/// Rows requested per page
const PAGE_SIZE: u32 = 5000;

/// Upper bound on pages followed for one indicator
const MAX_PAGES: u32 = 20;

/// Pagination header, the first element of every response
#[derive(Debug, Deserialize)]
struct PageInfo {
    page: u32,
    pages: u32,
}

/// A single observation row
#[derive(Debug, Deserialize)]
struct Observation {
    country: CountryRef,
    #[serde(default)]
    countryiso3code: Option<String>,
    date: String,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CountryRef {
    id: String,
}

/// One parsed page: pagination info plus normalized triples
#[derive(Debug)]
struct ParsedPage {
    page: u32,
    pages: u32,
    triples: Vec<(String, i32, f64)>,
}

/// Client for the World Bank indicators API
#[derive(Debug, Clone)]
pub struct WorldBankProvider {
    http: HttpClient,
    base_url: String,
    start_year: i32,
    end_year: i32,
}

impl WorldBankProvider {
    pub fn new(http: HttpClient, start_year: i32, end_year: i32) -> Self {
        Self {
            http,
            base_url: WORLD_BANK_BASE_URL.to_string(),
            start_year,
            end_year,
        }
    }

    /// Points the adapter at a different host (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn page_url(&self, code: &str, countries: &[&'static Country], page: u32) -> String {
        let codes: Vec<&str> = countries.iter().map(|c| c.iso3).collect();
        format!(
            "{}/country/{}/indicator/{}?format=json&per_page={}&date={}:{}&page={}",
            self.base_url,
            codes.join(";"),
            code,
            PAGE_SIZE,
            self.start_year,
            self.end_year,
            page
        )
    }

    async fn fetch_page(
        &self,
        code: &str,
        countries: &[&'static Country],
        page: u32,
    ) -> Result<ParsedPage, ProviderError> {
        let body: Value = self.http.get_json(&self.page_url(code, countries, page)).await?;
        parse_page(body)
    }
}

#[async_trait]
impl Provider for WorldBankProvider {
    fn id(&self) -> &str {
        "worldbank"
    }

    async fn fetch_series(
        &self,
        code: &str,
        countries: &[&'static Country],
    ) -> Result<Series, ProviderError> {
        if countries.is_empty() {
            return Ok(Series::new());
        }

        let mut triples = Vec::new();
        let mut page = 1;
        loop {
            let parsed = match self.fetch_page(code, countries, page).await {
                Ok(parsed) => parsed,
                // Nothing to salvage yet
                Err(err) if page == 1 => return Err(err),
                Err(err) => {
                    warn!(
                        code,
                        page,
                        error = %err,
                        "world bank page failed; keeping earlier pages"
                    );
                    break;
                }
            };
            triples.extend(parsed.triples);

            if parsed.page >= parsed.pages || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }

        debug!(code, observations = triples.len(), "world bank indicator fetched");
        Ok(Series::from_triples(triples))
    }
}

/// Parses one response page into canonical `(country, year, value)` triples
///
/// Rows with null values, unparseable years or unmapped country codes are
/// dropped; unmapped codes are logged.
fn parse_page(body: Value) -> Result<ParsedPage, ProviderError> {
    let Value::Array(mut parts) = body else {
        return Err(ProviderError::Parse("expected a JSON array".to_string()));
    };
    if parts.is_empty() {
        return Err(ProviderError::Parse("empty response".to_string()));
    }

    let header = parts.remove(0);
    if let Some(message) = header.get("message") {
        return Err(ProviderError::Parse(format!("world bank error: {message}")));
    }
    let info: PageInfo = serde_json::from_value(header)
        .map_err(|e| ProviderError::Parse(format!("bad pagination header: {e}")))?;

    let rows: Vec<Observation> = match parts.into_iter().next() {
        Some(Value::Null) | None => Vec::new(),
        Some(rows) => serde_json::from_value(rows)
            .map_err(|e| ProviderError::Parse(format!("bad observation rows: {e}")))?,
    };

    let mut triples = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(value) = row.value.filter(|v| v.is_finite()) else {
            continue;
        };
        let Ok(year) = row.date.trim().parse::<i32>() else {
            continue;
        };
        let country = row
            .countryiso3code
            .as_deref()
            .filter(|code| !code.is_empty())
            .and_then(country_by_iso3)
            .or_else(|| country_by_iso2(&row.country.id));
        match country {
            Some(country) => triples.push((country.id.to_string(), year, value)),
            None => warn!(code = %row.country.id, "dropping unmapped world bank country code"),
        }
    }

    Ok(ParsedPage {
        page: info.page,
        pages: info.pages,
        triples,
    })
}
