//! Output module for crawl artifacts
//!
//! This module handles:
//! - Persisting one file per crawled page
//! - Writing the visited-URL report
//! - Printing and logging the end-of-run summary

mod pages;
mod report;
mod summary;

pub use pages::{PageStore, SavedPage};
pub use report::write_visited_report;
pub use summary::{print_summary, CrawlSummary};
