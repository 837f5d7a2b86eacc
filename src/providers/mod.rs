//! Provider adapters
//!
//! Each adapter fetches named series from one data provider and normalizes
//! them into a [`Series`] keyed by canonical country identifiers. Adapters
//! don't know about the cache; the [`crate::fetcher`] layer sits above them.

pub mod fixture;
pub mod fred;
pub mod http;
pub mod imf;
pub mod world_bank;

#[cfg(test)]
mod test_server;

pub use fixture::FixtureProvider;
pub use fred::FredProvider;
pub use http::{HttpClient, RetryPolicy};
pub use imf::ImfProvider;
pub use world_bank::WorldBankProvider;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::data::{Country, Series};

/// Errors raised while fetching from a provider
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The request did not complete within the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a 5xx status
    #[error("server error {status} from {url}")]
    Server { status: u16, url: String },

    /// The provider answered with a 4xx status
    #[error("client error {status} from {url}")]
    Client { status: u16, url: String },

    /// The payload could not be understood
    #[error("malformed payload: {0}")]
    Parse(String),

    /// The adapter does not serve this indicator code
    #[error("{provider} does not serve indicator '{code}'")]
    UnsupportedIndicator { provider: String, code: String },

    /// The pipeline references a provider that is not registered
    #[error("no provider registered as '{0}'")]
    UnknownProvider(String),

    /// The adapter is missing required configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Transient errors are worth retrying; everything else is permanent
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_) | ProviderError::Network(_) | ProviderError::Server { .. }
        )
    }
}

/// A source of indicator series
///
/// `fetch_series` returns whatever succeeded: failures for individual
/// countries are logged inside the adapter and simply leave those countries
/// out. An `Err` means nothing usable came back at all.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identifier used in cache keys and catalog entries
    fn id(&self) -> &str;

    /// Fetch one indicator for the given countries
    async fn fetch_series(
        &self,
        code: &str,
        countries: &[&'static Country],
    ) -> Result<Series, ProviderError>;
}

/// Providers by id
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the live World Bank, FRED and IMF adapters
    pub fn live(config: &PipelineConfig) -> Result<Self, ProviderError> {
        let http = HttpClient::new(config.request_timeout, config.retry)?;
        let mut registry = Self::new();
        registry.register(Arc::new(WorldBankProvider::new(
            http.clone(),
            config.start_year,
            config.end_year,
        )));
        registry.register(Arc::new(FredProvider::new(
            http.clone(),
            config.fred_api_key.clone(),
            config.start_year,
            config.request_delay,
        )));
        registry.register(Arc::new(ImfProvider::new(
            http,
            config.start_year,
            config.end_year,
        )));
        Ok(registry)
    }

    /// Adds a provider, replacing any previous one with the same id
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
