use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for WebScour
///
/// Every section and key is optional; missing values fall back to the
/// built-in defaults (30 pages, 3 workers, 3 attempts).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub queue: QueueConfig,
    pub output: OutputConfig,
}

/// Link admission policy for discovered URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostPolicySetting {
    /// Accept any absolute HTTP(S) link
    #[default]
    Any,

    /// Accept only links on the same host as the page they were found on
    SameHost,
}

/// Crawl budget and worker pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Global page budget shared by all workers
    #[serde(rename = "max-pages")]
    pub max_pages: u64,

    /// Number of parallel workers
    #[serde(rename = "num-workers")]
    pub num_workers: usize,

    /// Which discovered links are eligible for the frontier
    #[serde(rename = "host-policy")]
    pub host_policy: HostPolicySetting,

    /// How many times a URL whose fetch failed is republished for another
    /// worker to try (0 = abandon after the first failed fetch)
    #[serde(rename = "failed-fetch-requeues")]
    pub failed_fetch_requeues: u32,

    /// Seconds the frontier must stay empty before the crawl ends (0 = never)
    #[serde(rename = "idle-timeout-secs")]
    pub idle_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 30,
            num_workers: 3,
            host_policy: HostPolicySetting::Any,
            failed_fetch_requeues: 0,
            idle_timeout_secs: 30,
        }
    }
}

impl CrawlerConfig {
    /// Idle window after which an empty frontier ends the crawl
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Fetch retry policy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Total attempts per URL, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Per-attempt timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Fixed wait between attempts in milliseconds
    #[serde(rename = "backoff-ms")]
    pub backoff_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_ms: 5_000,
            backoff_ms: 1_000,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "WebScourCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version` or `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Frontier queue configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Path to the SQLite database backing the durable queue
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Queue name shared by the seeder and the workers
    pub name: String,

    /// Maximum unacknowledged deliveries per worker
    pub prefetch: u32,

    /// How often an idle consumer re-checks the queue (milliseconds)
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: "./frontier.db".to_string(),
            name: "url_queue".to_string(),
            prefetch: 1,
            poll_interval_ms: 250,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving one file per saved page
    #[serde(rename = "pages-dir")]
    pub pages_dir: String,

    /// Path of the visited-URL report written at the end of the crawl
    #[serde(rename = "visited-path")]
    pub visited_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pages_dir: "./pages".to_string(),
            visited_path: "./visited.txt".to_string(),
        }
    }
}
