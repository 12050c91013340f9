//! Crawler module for the distributed worker pool
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a fixed linear retry policy
//! - HTML parsing and link extraction
//! - The per-task worker loop over the frontier queue
//! - Overall crawl coordination and the global stop signal

mod coordinator;
mod fetcher;
mod parser;
mod worker;

pub use coordinator::{Coordinator, StopReason, StopSignal};
pub use fetcher::{
    build_http_client, FetchError, FetchFailure, Fetcher, HttpSource, PageSource, RetryPolicy,
    SourceResponse,
};
pub use parser::extract_links;
pub use worker::{TaskOutcome, Worker, WorkerReport, WorkerShared};
