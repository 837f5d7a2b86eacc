//! Merge engine
//!
//! Folds supplementary per-country sources into a base [`Series`]. Each step
//! of a merge chain names its source and a [`MergeMode`]; steps run strictly
//! in list order and each receives the previous step's output as its base.
//! The result depends only on that order, never on which fetch finished first.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{CountrySeries, Series, YearRecord};

/// How a supplementary source may touch values already in the base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MergeMode {
    /// Only fill countries missing from a year; never overwrite
    FillGaps,
    /// Fill gaps, and overwrite existing values for years `>= cutoff`
    OverrideRecent { cutoff: i32 },
}

impl MergeMode {
    fn should_write(self, year: i32, existing: Option<f64>) -> bool {
        match (self, existing) {
            (_, None) => true,
            (MergeMode::FillGaps, Some(_)) => false,
            (MergeMode::OverrideRecent { cutoff }, Some(_)) => year >= cutoff,
        }
    }
}

/// One entry of a merge chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStep {
    /// Name of the supplementary source
    pub source: String,
    pub mode: MergeMode,
}

impl MergeStep {
    pub fn fill_gaps(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            mode: MergeMode::FillGaps,
        }
    }

    pub fn override_recent(source: impl Into<String>, cutoff: i32) -> Self {
        Self {
            source: source.into(),
            mode: MergeMode::OverrideRecent { cutoff },
        }
    }
}

/// Errors from applying a merge chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// A step names a source that was never fetched
    #[error("merge step references unknown source '{name}'")]
    UnknownSource { name: String },
}

/// Merges one supplementary source into `base`
///
/// Years missing from the base get a new record holding only the
/// supplement's countries, so the result may be ragged. Non-finite
/// supplement values are ignored. An empty supplement returns `base` as is.
pub fn merge(base: Series, supplement: &CountrySeries, mode: MergeMode) -> Series {
    if supplement.values().all(Vec::is_empty) {
        return base;
    }

    let mut by_year: BTreeMap<i32, YearRecord> = base
        .into_records()
        .into_iter()
        .map(|record| (record.year, record))
        .collect();

    for (country, points) in supplement {
        for point in points {
            if !point.value.is_finite() {
                continue;
            }
            let record = by_year
                .entry(point.year)
                .or_insert_with(|| YearRecord::new(point.year));
            if mode.should_write(point.year, record.get(country)) {
                record.insert(country.clone(), point.value);
            }
        }
    }

    Series::from_year_map(by_year)
}

/// Applies `steps` in order, starting from `base`
///
/// Every step's source must be present in `sources`; an empty source is a
/// valid no-op (a failed fetch), a missing one is a configuration error.
pub fn apply_chain(
    base: Series,
    steps: &[MergeStep],
    sources: &HashMap<String, CountrySeries>,
) -> Result<Series, MergeError> {
    steps.iter().try_fold(base, |acc, step| {
        let supplement = sources
            .get(&step.source)
            .ok_or_else(|| MergeError::UnknownSource {
                name: step.source.clone(),
            })?;
        Ok(merge(acc, supplement, step.mode))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataPoint;

    fn base() -> Series {
        Series::from_records(vec![YearRecord::new(2020).with("USA", 1.0)])
    }

    fn supplement(country: &str, points: &[(i32, f64)]) -> CountrySeries {
        let mut out = CountrySeries::new();
        out.insert(
            country.to_string(),
            points.iter().map(|&(y, v)| DataPoint::new(y, v)).collect(),
        );
        out
    }

    #[test]
    fn test_fill_gaps_keeps_existing_and_adds_new_year() {
        let supp = supplement("USA", &[(2020, 9.9), (2021, 2.0)]);

        let merged = merge(base(), &supp, MergeMode::FillGaps);

        assert_eq!(
            merged.records(),
            &[
                YearRecord::new(2020).with("USA", 1.0),
                YearRecord::new(2021).with("USA", 2.0),
            ]
        );
    }

    #[test]
    fn test_override_recent_overwrites_at_cutoff() {
        let supp = supplement("USA", &[(2020, 9.9)]);

        let merged = merge(base(), &supp, MergeMode::OverrideRecent { cutoff: 2020 });

        assert_eq!(merged.records(), &[YearRecord::new(2020).with("USA", 9.9)]);
    }

    #[test]
    fn test_override_recent_respects_cutoff() {
        let base = Series::from_triples(vec![("USA", 2018, 1.0), ("USA", 2022, 2.0)]);
        let supp = supplement("USA", &[(2018, 5.0), (2022, 6.0)]);

        let merged = merge(base, &supp, MergeMode::OverrideRecent { cutoff: 2020 });

        assert_eq!(merged.value(2018, "USA"), Some(1.0));
        assert_eq!(merged.value(2022, "USA"), Some(6.0));
    }

    #[test]
    fn test_override_recent_fills_old_gaps() {
        let base = Series::from_triples(vec![("USA", 2010, 1.0)]);
        let supp = supplement("Japan", &[(2010, 0.1)]);

        let merged = merge(base, &supp, MergeMode::OverrideRecent { cutoff: 2020 });

        assert_eq!(merged.value(2010, "Japan"), Some(0.1));
        assert_eq!(merged.value(2010, "USA"), Some(1.0));
    }

    #[test]
    fn test_empty_supplement_is_noop() {
        let mut empty = CountrySeries::new();
        assert_eq!(merge(base(), &empty, MergeMode::FillGaps), base());

        empty.insert("USA".to_string(), Vec::new());
        assert_eq!(
            merge(base(), &empty, MergeMode::OverrideRecent { cutoff: 0 }),
            base()
        );
    }

    #[test]
    fn test_new_year_record_is_sparse() {
        let base = Series::from_triples(vec![("USA", 2020, 1.0), ("Japan", 2020, 0.5)]);
        let supp = supplement("UK", &[(1999, 4.0)]);

        let merged = merge(base, &supp, MergeMode::FillGaps);

        let record = merged.get(1999).expect("new year inserted");
        assert_eq!(record.values.len(), 1);
        assert_eq!(record.get("UK"), Some(4.0));
        assert_eq!(merged.records()[0].year, 1999);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_non_finite_supplement_values_are_skipped() {
        let supp = supplement("USA", &[(2021, f64::NAN), (2022, f64::INFINITY)]);
        let merged = merge(base(), &supp, MergeMode::FillGaps);
        assert_eq!(merged, base());
    }

    #[test]
    fn test_fill_gaps_is_idempotent() {
        let base = Series::from_triples(vec![("USA", 2019, 1.0), ("Japan", 2021, 0.2)]);
        let mut supp = supplement("USA", &[(2019, 7.0), (2020, 1.5), (2023, 3.0)]);
        supp.insert(
            "Japan".to_string(),
            vec![DataPoint::new(2020, 0.1), DataPoint::new(2021, 9.0)],
        );

        let once = merge(base, &supp, MergeMode::FillGaps);
        let twice = merge(once.clone(), &supp, MergeMode::FillGaps);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_chain_order_matters_and_is_deterministic() {
        let base = Series::from_triples(vec![("USA", 2019, 1.0)]);
        let mut sources = HashMap::new();
        sources.insert("central_bank".to_string(), supplement("USA", &[(2021, 0.25)]));
        sources.insert("regional".to_string(), supplement("USA", &[(2021, 0.5), (2022, 4.0)]));

        let steps = vec![
            MergeStep::override_recent("central_bank", 2020),
            MergeStep::fill_gaps("regional"),
        ];
        let first = apply_chain(base.clone(), &steps, &sources).unwrap();
        let again = apply_chain(base.clone(), &steps, &sources).unwrap();

        assert_eq!(first, again);
        assert_eq!(first.value(2021, "USA"), Some(0.25));
        assert_eq!(first.value(2022, "USA"), Some(4.0));

        let reversed = vec![
            MergeStep::fill_gaps("regional"),
            MergeStep::fill_gaps("central_bank"),
        ];
        let other = apply_chain(base, &reversed, &sources).unwrap();
        assert_eq!(other.value(2021, "USA"), Some(0.5));
    }

    #[test]
    fn test_chain_with_unknown_source_fails() {
        let steps = vec![MergeStep::fill_gaps("missing")];
        let err = apply_chain(base(), &steps, &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            MergeError::UnknownSource {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_empty_chain_returns_base() {
        assert_eq!(apply_chain(base(), &[], &HashMap::new()).unwrap(), base());
    }
}
