//! WebScour: a queue-mediated distributed web crawler
//!
//! This crate implements a pool of crawl workers that pull URLs from a shared
//! durable frontier queue, fetch and save pages, republish discovered links,
//! and stop together once a global page budget is reached.

pub mod config;
pub mod crawler;
pub mod output;
pub mod queue;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for WebScour operations
#[derive(Debug, Error)]
pub enum ScourError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for WebScour operations
pub type Result<T> = std::result::Result<T, ScourError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, StopReason};
pub use output::CrawlSummary;
pub use state::{Admission, CrawlState};
pub use crate::url::{filter_link, HostPolicy, LinkFilter, Rejection};
