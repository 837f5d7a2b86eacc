//! Canonical country identifiers and provider code mappings
//!
//! Every provider adapter joins on the canonical `id` ("USA", "Japan", ...).
//! Providers speak ISO-2, ISO-3 or their own series ids, so each adapter
//! resolves codes through this table. Codes that don't resolve are dropped by
//! the adapter with a warning.

use serde::Serialize;

/// A country the dashboard knows how to join across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    /// Canonical identifier used as the join key in every series
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// ISO 3166-1 alpha-2 code
    pub iso2: &'static str,
    /// ISO 3166-1 alpha-3 code
    pub iso3: &'static str,
    /// FRED series id carrying this country's central bank policy rate
    pub fred_policy_rate: Option<&'static str>,
}

/// Static table of supported countries
pub static COUNTRIES: [Country; 16] = [
    Country {
        id: "USA",
        name: "United States",
        iso2: "US",
        iso3: "USA",
        fred_policy_rate: Some("FEDFUNDS"),
    },
    Country {
        id: "UK",
        name: "United Kingdom",
        iso2: "GB",
        iso3: "GBR",
        fred_policy_rate: Some("IRSTCI01GBM156N"),
    },
    Country {
        id: "Japan",
        name: "Japan",
        iso2: "JP",
        iso3: "JPN",
        fred_policy_rate: Some("IRSTCI01JPM156N"),
    },
    Country {
        id: "Germany",
        name: "Germany",
        iso2: "DE",
        iso3: "DEU",
        fred_policy_rate: Some("ECBDFR"),
    },
    Country {
        id: "France",
        name: "France",
        iso2: "FR",
        iso3: "FRA",
        fred_policy_rate: Some("ECBDFR"),
    },
    Country {
        id: "Italy",
        name: "Italy",
        iso2: "IT",
        iso3: "ITA",
        fred_policy_rate: Some("ECBDFR"),
    },
    Country {
        id: "Spain",
        name: "Spain",
        iso2: "ES",
        iso3: "ESP",
        fred_policy_rate: Some("ECBDFR"),
    },
    Country {
        id: "Canada",
        name: "Canada",
        iso2: "CA",
        iso3: "CAN",
        fred_policy_rate: Some("IRSTCI01CAM156N"),
    },
    Country {
        id: "Australia",
        name: "Australia",
        iso2: "AU",
        iso3: "AUS",
        fred_policy_rate: Some("IRSTCI01AUM156N"),
    },
    Country {
        id: "Korea",
        name: "South Korea",
        iso2: "KR",
        iso3: "KOR",
        fred_policy_rate: Some("IRSTCI01KRM156N"),
    },
    Country {
        id: "China",
        name: "China",
        iso2: "CN",
        iso3: "CHN",
        fred_policy_rate: Some("IRSTCI01CNM156N"),
    },
    Country {
        id: "India",
        name: "India",
        iso2: "IN",
        iso3: "IND",
        fred_policy_rate: Some("IRSTCI01INM156N"),
    },
    Country {
        id: "Brazil",
        name: "Brazil",
        iso2: "BR",
        iso3: "BRA",
        fred_policy_rate: Some("IRSTCI01BRM156N"),
    },
    Country {
        id: "Mexico",
        name: "Mexico",
        iso2: "MX",
        iso3: "MEX",
        fred_policy_rate: Some("IRSTCI01MXM156N"),
    },
    Country {
        id: "Russia",
        name: "Russia",
        iso2: "RU",
        iso3: "RUS",
        fred_policy_rate: None,
    },
    Country {
        id: "Switzerland",
        name: "Switzerland",
        iso2: "CH",
        iso3: "CHE",
        fred_policy_rate: Some("IRSTCI01CHM156N"),
    },
];

/// Returns every supported country, in table order
pub fn all_countries() -> &'static [Country] {
    &COUNTRIES
}

/// Looks up a country by its canonical identifier (case-insensitive)
pub fn country_by_id(id: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.id.eq_ignore_ascii_case(id))
}

/// Looks up a country by ISO-2 code (case-insensitive)
pub fn country_by_iso2(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.iso2.eq_ignore_ascii_case(code))
}

/// Looks up a country by ISO-3 code (case-insensitive)
pub fn country_by_iso3(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.iso3.eq_ignore_ascii_case(code))
}
