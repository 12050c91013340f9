//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the crawler's user agent string
//! - The `PageSource` capability the fetcher retries against
//! - A fixed linear retry policy: every attempt is bounded by a timeout and
//!   followed by a constant backoff before the next one

use crate::config::{FetcherConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a single fetch attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("empty response body")]
    EmptyBody,

    #[error("failed to read body: {0}")]
    Body(String),
}

/// Raw response of one GET
#[derive(Debug, Clone)]
pub struct SourceResponse {
    pub status: u16,
    pub body: String,
}

impl SourceResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Capability to GET a URL
///
/// `HttpSource` is the network implementation; tests substitute scripted
/// sources.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<SourceResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// The header is `Name/Version`, or `Name/Version (+ContactURL)` when a
/// contact URL is configured.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use webscour::config::UserAgentConfig;
/// use webscour::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(5)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageSource` backed by a reqwest client
pub struct HttpSource {
    client: Client,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn get(&self, url: &str) -> Result<SourceResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        Ok(SourceResponse { status, body })
    }
}

/// Fixed linear retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Bound on each attempt
    pub timeout: Duration,
    /// Wait between two attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetcherConfig::default())
    }
}

impl From<&FetcherConfig> for RetryPolicy {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            timeout: Duration::from_millis(config.timeout_ms),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

/// All attempts for a URL failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("gave up after {attempts} attempts: {last_error}")]
pub struct FetchFailure {
    pub attempts: u32,
    pub last_error: FetchError,
}

/// Retrying fetcher shared by all workers
pub struct Fetcher {
    source: Arc<dyn PageSource>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(source: Arc<dyn PageSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetches a page body
    ///
    /// An attempt succeeds only on a 2xx status with a body that is not
    /// blank. Any other outcome waits `backoff` and tries again, so an
    /// always-failing URL costs `max_attempts` attempts and
    /// `max_attempts - 1` waits. Failures are per-URL and never fatal.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = FetchError::EmptyBody;

        for attempt in 1..=max_attempts {
            match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::warn!("[Attempt {}] Error fetching {}: {}", attempt, url, e);
                    last_error = e;
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        Err(FetchFailure {
            attempts: max_attempts,
            last_error,
        })
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let response = tokio::time::timeout(self.policy.timeout, self.source.get(url))
            .await
            .map_err(|_| FetchError::Timeout(self.policy.timeout))??;

        if !(200..300).contains(&response.status) {
            return Err(FetchError::Status(response.status));
        }

        if response.body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(response.body)
    }
}
