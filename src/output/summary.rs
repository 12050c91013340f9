//! End-of-run summary

use crate::crawler::StopReason;
use std::time::Duration;

/// Totals for one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Size of the worker pool
    pub workers: usize,
    pub pages_crawled: u64,
    pub max_pages: u64,
    pub elapsed: Duration,
    pub stop_reason: Option<StopReason>,

    /// URLs admitted this run, including ones whose fetch failed
    pub urls_admitted: usize,
    pub duplicates_skipped: u64,
    pub budget_skips: u64,
    /// Deliveries sent back while the budget was fully reserved
    pub deferred: u64,
    pub fetch_failures: u64,
    pub save_failures: u64,
    pub links_published: u64,
    pub requeued: u64,

    /// Workers whose loop ended on a queue error
    pub failed_workers: usize,

    /// Messages left ready in the queue after shutdown
    pub frontier_remaining: u64,
}

impl CrawlSummary {
    pub fn elapsed_secs(&self) -> f64 {
        (self.elapsed.as_secs_f64() * 100.0).round() / 100.0
    }

    /// Emits the summary as a single structured log event
    pub fn log(&self) {
        tracing::info!(
            workers = self.workers,
            pages_crawled = self.pages_crawled,
            elapsed_secs = self.elapsed_secs(),
            stop_reason = ?self.stop_reason,
            duplicates = self.duplicates_skipped,
            fetch_failures = self.fetch_failures,
            links_published = self.links_published,
            "Crawl finished"
        );
    }
}

/// Prints the summary banner to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("\n========== SUMMARY ==========");
    println!("Workers used        : {}", summary.workers);
    println!(
        "Total pages crawled : {} / {}",
        summary.pages_crawled, summary.max_pages
    );
    println!("Time taken (sec)    : {:.2}", summary.elapsed_secs());
    match summary.stop_reason {
        Some(reason) => println!("Stopped because     : {}", reason),
        None => println!("Stopped because     : -"),
    }
    println!("URLs admitted       : {}", summary.urls_admitted);
    println!("Duplicates skipped  : {}", summary.duplicates_skipped);
    println!("Fetch failures      : {}", summary.fetch_failures);
    if summary.save_failures > 0 {
        println!("Save failures       : {}", summary.save_failures);
    }
    if summary.deferred > 0 {
        println!("Deferred on budget  : {}", summary.deferred);
    }
    if summary.requeued > 0 {
        println!("Requeued for retry  : {}", summary.requeued);
    }
    println!("Links published     : {}", summary.links_published);
    println!("Frontier remaining  : {}", summary.frontier_remaining);
    if summary.failed_workers > 0 {
        println!("Failed workers      : {}", summary.failed_workers);
    }
    println!("=============================");
}
