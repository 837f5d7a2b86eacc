//! Core data models for econdash
//!
//! This module contains the year-indexed, per-country table types shared by
//! provider adapters, the merge engine and the orchestrator.

pub mod countries;

pub use countries::{all_countries, country_by_id, country_by_iso2, country_by_iso3, Country};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row of a [`Series`]: a year plus a sparse country -> value table
///
/// An absent country means "no data", never zero. Serializes flat, e.g.
/// `{"year": 2020, "USA": 1.0, "Japan": -0.1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRecord {
    /// Calendar year of the observations
    pub year: i32,
    /// Country identifier -> value
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl YearRecord {
    /// Creates an empty record for the given year
    pub fn new(year: i32) -> Self {
        Self {
            year,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert, mostly useful in tests and fixtures
    pub fn with(mut self, country: impl Into<String>, value: f64) -> Self {
        self.insert(country, value);
        self
    }

    /// Sets a country's value, ignoring non-finite numbers
    ///
    /// Returns `true` when the value was stored.
    pub fn insert(&mut self, country: impl Into<String>, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.values.insert(country.into(), value);
        true
    }

    /// Returns the value for a country, if present
    pub fn get(&self, country: &str) -> Option<f64> {
        self.values.get(country).copied()
    }

    /// Iterates over the countries that have a value in this record
    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// A single (year, value) observation for one country
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub year: i32,
    pub value: f64,
}

impl DataPoint {
    pub fn new(year: i32, value: f64) -> Self {
        Self { year, value }
    }
}

/// Supplementary-source shape: country identifier -> observations
pub type CountrySeries = BTreeMap<String, Vec<DataPoint>>;

/// Violations of the [`Series`] ordering and value invariants
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    /// Two records are out of order or share a year
    #[error("years not strictly increasing: {previous} followed by {next}")]
    NotStrictlyIncreasing { previous: i32, next: i32 },

    /// A record holds NaN or an infinite value
    #[error("non-finite value for {country} in {year}")]
    NonFiniteValue { year: i32, country: String },
}

/// Ordered, year-indexed sequence of per-country values for one indicator
///
/// Records are strictly increasing by year with no duplicate years. Every
/// constructor normalizes its input so the invariant holds; [`Series::validate`]
/// re-checks it for data that arrived through deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series {
    records: Vec<YearRecord>,
}

impl Series {
    /// Creates an empty series
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a series from `(country, year, value)` triples
    ///
    /// Non-finite values are dropped. When the same country appears twice for
    /// one year the later triple wins.
    pub fn from_triples<I, S>(triples: I) -> Self
    where
        I: IntoIterator<Item = (S, i32, f64)>,
        S: Into<String>,
    {
        let mut by_year: BTreeMap<i32, YearRecord> = BTreeMap::new();
        for (country, year, value) in triples {
            if !value.is_finite() {
                continue;
            }
            by_year
                .entry(year)
                .or_insert_with(|| YearRecord::new(year))
                .insert(country, value);
        }
        Self::from_year_map(by_year)
    }

    /// Builds a series from arbitrary records, sorting them and folding
    /// duplicate years together
    pub fn from_records(records: impl IntoIterator<Item = YearRecord>) -> Self {
        let mut by_year: BTreeMap<i32, YearRecord> = BTreeMap::new();
        for record in records {
            let slot = by_year
                .entry(record.year)
                .or_insert_with(|| YearRecord::new(record.year));
            for (country, value) in record.values {
                slot.insert(country, value);
            }
        }
        Self::from_year_map(by_year)
    }

    /// Builds a series from a year-keyed map; the map's ordering is the
    /// series ordering
    pub(crate) fn from_year_map(by_year: BTreeMap<i32, YearRecord>) -> Self {
        Self {
            records: by_year
                .into_values()
                .filter(|record| !record.values.is_empty())
                .collect(),
        }
    }

    /// Builds a series from the supplementary per-country shape
    pub fn from_country_series(points: &CountrySeries) -> Self {
        Self::from_triples(points.iter().flat_map(|(country, points)| {
            points
                .iter()
                .map(move |point| (country.clone(), point.year, point.value))
        }))
    }

    /// Converts the series into the per-country shape used by supplements
    pub fn to_country_series(&self) -> CountrySeries {
        let mut out: CountrySeries = BTreeMap::new();
        for record in &self.records {
            for (country, value) in &record.values {
                out.entry(country.clone())
                    .or_default()
                    .push(DataPoint::new(record.year, *value));
            }
        }
        out
    }

    pub fn records(&self) -> &[YearRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<YearRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the record for a year, if present
    pub fn get(&self, year: i32) -> Option<&YearRecord> {
        self.records
            .binary_search_by_key(&year, |record| record.year)
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// Returns a single country's value for a year
    pub fn value(&self, year: i32, country: &str) -> Option<f64> {
        self.get(year).and_then(|record| record.get(country))
    }

    /// Total number of (country, year) observations
    pub fn observation_count(&self) -> usize {
        self.records.iter().map(|record| record.values.len()).sum()
    }

    /// First and last year covered, if any
    pub fn year_range(&self) -> Option<(i32, i32)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.year, last.year)),
            _ => None,
        }
    }

    /// Checks the ordering and finiteness invariants
    pub fn validate(&self) -> Result<(), SeriesError> {
        for pair in self.records.windows(2) {
            if pair[0].year >= pair[1].year {
                return Err(SeriesError::NotStrictlyIncreasing {
                    previous: pair[0].year,
                    next: pair[1].year,
                });
            }
        }
        for record in &self.records {
            if let Some((country, _)) = record.values.iter().find(|(_, v)| !v.is_finite()) {
                return Err(SeriesError::NonFiniteValue {
                    year: record.year,
                    country: country.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The full set of named series produced by one orchestrator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Indicator key -> merged series
    pub indicators: BTreeMap<String, Series>,
    /// When the bundle was assembled
    pub fetched_at: DateTime<Utc>,
}

impl Bundle {
    /// Returns the series for an indicator key
    pub fn get(&self, indicator: &str) -> Option<&Series> {
        self.indicators.get(indicator)
    }

    /// Number of indicators that ended up with at least one observation
    pub fn populated_count(&self) -> usize {
        self.indicators.values().filter(|s| !s.is_empty()).count()
    }
}
