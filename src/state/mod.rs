//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: the visited set, page counter, budget and stop flag shared
//!   by every worker
//! - `Admission`: result of the atomic admission check

mod crawl_state;

// Re-export main types
pub use crawl_state::{Admission, CrawlState};
