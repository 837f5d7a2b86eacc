//! Indicator catalog
//!
//! The fixed set of indicators a bundle contains, the supplementary sources
//! fetched alongside them, and the merge chain applied to each indicator.
//! Chains are plain ordered data so the priority order is visible and
//! testable.

use crate::merge::MergeStep;
use crate::providers::fred::POLICY_RATE_CODE;

/// A primary indicator: one series in the bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSpec {
    /// Bundle key
    pub key: String,
    /// Provider id serving the primary series
    pub provider: String,
    /// Provider-specific indicator code
    pub code: String,
}

impl IndicatorSpec {
    pub fn new(
        key: impl Into<String>,
        provider: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            provider: provider.into(),
            code: code.into(),
        }
    }
}

/// A supplementary source merged into one or more indicators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplementSpec {
    /// Name referenced by merge steps
    pub name: String,
    pub provider: String,
    pub code: String,
}

impl SupplementSpec {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            code: code.into(),
        }
    }
}

/// Ordered merge steps for one indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSpec {
    pub indicator: String,
    pub steps: Vec<MergeStep>,
}

impl ChainSpec {
    pub fn new(indicator: impl Into<String>, steps: Vec<MergeStep>) -> Self {
        Self {
            indicator: indicator.into(),
            steps,
        }
    }
}

/// Everything the orchestrator fetches and how it is combined
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub indicators: Vec<IndicatorSpec>,
    pub supplements: Vec<SupplementSpec>,
    pub chains: Vec<ChainSpec>,
}

impl Catalog {
    /// The production catalog
    ///
    /// `recency_cutoff` is the first year in which central bank policy rates
    /// override the World Bank lending rate.
    pub fn standard(recency_cutoff: i32) -> Self {
        let indicators = vec![
            IndicatorSpec::new("lending_rate", "worldbank", "FR.INR.LEND"),
            IndicatorSpec::new("real_interest_rate", "worldbank", "FR.INR.RINR"),
            IndicatorSpec::new("gdp_growth", "worldbank", "NY.GDP.MKTP.KD.ZG"),
            IndicatorSpec::new("gdp_per_capita", "worldbank", "NY.GDP.PCAP.CD"),
            IndicatorSpec::new("inflation", "worldbank", "FP.CPI.TOTL.ZG"),
            IndicatorSpec::new("unemployment", "worldbank", "SL.UEM.TOTL.ZS"),
            IndicatorSpec::new("government_debt", "worldbank", "GC.DOD.TOTL.GD.ZS"),
            IndicatorSpec::new("rd_spending", "worldbank", "GB.XPD.RSDV.GD.ZS"),
            IndicatorSpec::new("researchers", "worldbank", "SP.POP.SCIE.RD.P6"),
            IndicatorSpec::new("patents_resident", "worldbank", "IP.PAT.RESD"),
            IndicatorSpec::new("patents_nonresident", "worldbank", "IP.PAT.NRES"),
            IndicatorSpec::new("high_tech_exports", "worldbank", "TX.VAL.TECH.MF.ZS"),
            IndicatorSpec::new("internet_users", "worldbank", "IT.NET.USER.ZS"),
            IndicatorSpec::new("tertiary_enrollment", "worldbank", "SE.TER.ENRR"),
        ];

        let supplements = vec![
            SupplementSpec::new("fred_policy_rate", "fred", POLICY_RATE_CODE),
            SupplementSpec::new("imf_gdp_growth", "imf", "NGDP_RPCH"),
            SupplementSpec::new("imf_inflation", "imf", "PCPIPCH"),
            SupplementSpec::new("imf_unemployment", "imf", "LUR"),
            SupplementSpec::new("imf_government_debt", "imf", "GGXWDG_NGDP"),
        ];

        let chains = vec![
            ChainSpec::new(
                "lending_rate",
                vec![MergeStep::override_recent("fred_policy_rate", recency_cutoff)],
            ),
            ChainSpec::new("gdp_growth", vec![MergeStep::fill_gaps("imf_gdp_growth")]),
            ChainSpec::new("inflation", vec![MergeStep::fill_gaps("imf_inflation")]),
            ChainSpec::new("unemployment", vec![MergeStep::fill_gaps("imf_unemployment")]),
            ChainSpec::new(
                "government_debt",
                vec![MergeStep::fill_gaps("imf_government_debt")],
            ),
        ];

        Self {
            indicators,
            supplements,
            chains,
        }
    }

    /// Merge steps for an indicator, empty when it has no chain
    pub fn chain_for(&self, indicator: &str) -> &[MergeStep] {
        self.chains
            .iter()
            .find(|chain| chain.indicator == indicator)
            .map(|chain| chain.steps.as_slice())
            .unwrap_or(&[])
    }

    /// Chains naming an indicator that is not part of the catalog
    pub fn orphan_chains(&self) -> impl Iterator<Item = &ChainSpec> {
        self.chains
            .iter()
            .filter(|chain| !self.indicators.iter().any(|spec| spec.key == chain.indicator))
    }
}
