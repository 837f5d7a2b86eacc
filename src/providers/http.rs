//! HTTP transport shared by the provider adapters
//!
//! Every request carries a fixed timeout. Transient failures (timeouts,
//! connection errors, 5xx) are retried with exponential backoff up to a fixed
//! budget; 4xx responses and malformed payloads fail immediately.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::ProviderError;

/// Retry budget for transient provider errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after `failed_attempts` consecutive failures
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.base_delay * 2u32.pow(exponent)
    }
}

/// `reqwest::Client` wrapper with timeout and retry behaviour
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Builds a client with the given per-request timeout and retry policy
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("econdash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, retry })
    }

    /// GETs `url` and decodes the JSON body, retrying transient failures
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts.max(1) {
            if attempt > 1 {
                let delay = self.retry.delay_after(attempt - 1);
                debug!(url, attempt, ?delay, "retrying request");
                tokio::time::sleep(delay).await;
            }

            match self.get_once(url).await {
                Ok(body) => return decode(url, &body),
                Err(err) if err.is_transient() => {
                    warn!(url, attempt, error = %err, "transient provider error");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::Network(format!("no attempts made for {url}"))))
    }

    async fn get_once(&self, url: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport_error(url, e))?;

        let status = response.status();
        if let Some(err) = classify_status(url, status) {
            return Err(err);
        }

        response
            .text()
            .await
            .map_err(|e| classify_transport_error(url, e))
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("unexpected payload from {url}: {e}")))
}

/// Maps a non-success status to an error, `None` for 2xx/3xx
fn classify_status(url: &str, status: StatusCode) -> Option<ProviderError> {
    if status.is_client_error() {
        Some(ProviderError::Client {
            status: status.as_u16(),
            url: url.to_string(),
        })
    } else if status.is_server_error() {
        Some(ProviderError::Server {
            status: status.as_u16(),
            url: url.to_string(),
        })
    } else {
        None
    }
}

fn classify_transport_error(url: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(url.to_string())
    } else {
        ProviderError::Network(format!("{url}: {err}"))
    }
}
