//! Shared crawl state: visited set, page counter, budget and stop flag
//!
//! Every operation takes the single state lock for its whole
//! read-modify-write sequence. The lock is never held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Outcome of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The URL is now visited and holds one budget slot
    Admitted,

    /// The URL was admitted before; it must not be crawled again
    Duplicate,

    /// `max_pages` pages have been saved
    BudgetExceeded,

    /// Pages are not all saved yet, but in-flight admissions hold every
    /// remaining slot. The URL must be retried later, not dropped.
    BudgetReserved,
}

#[derive(Debug, Default)]
struct Inner {
    visited: HashSet<String>,
    /// Admission order of `visited`, used for the visited report
    order: Vec<String>,
    pages_crawled: u64,
    /// Admitted URLs whose page is not yet recorded or released
    reserved: u64,
    /// Failed fetches per URL, for the requeue policy
    failures: HashMap<String, u32>,
    stopped: bool,
}

/// Process-wide crawl state shared by all workers
///
/// `pages_crawled + reserved <= max_pages` holds at all times, so the page
/// counter can never pass the budget no matter how workers interleave.
#[derive(Debug)]
pub struct CrawlState {
    max_pages: u64,
    inner: Mutex<Inner>,
}

impl CrawlState {
    pub fn new(max_pages: u64) -> Self {
        Self {
            max_pages,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The critical sections cannot leave Inner half-updated
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_pages(&self) -> u64 {
        self.max_pages
    }

    /// Atomically checks a URL and, if allowed, marks it visited
    ///
    /// A URL seen before is `Duplicate` even when the budget is also spent.
    pub fn try_admit(&self, url: &str) -> Admission {
        let mut inner = self.lock();

        if inner.visited.contains(url) {
            return Admission::Duplicate;
        }

        if inner.pages_crawled >= self.max_pages {
            return Admission::BudgetExceeded;
        }

        if inner.pages_crawled + inner.reserved >= self.max_pages {
            return Admission::BudgetReserved;
        }

        inner.visited.insert(url.to_string());
        inner.order.push(url.to_string());
        inner.reserved += 1;
        Admission::Admitted
    }

    /// Counts a saved page against the budget
    ///
    /// The caller must hold an admission for the page. Returns the new count.
    pub fn record_page(&self) -> u64 {
        let mut inner = self.lock();
        debug_assert!(inner.reserved > 0, "record_page without an admission");
        inner.reserved = inner.reserved.saturating_sub(1);
        inner.pages_crawled += 1;
        inner.pages_crawled
    }

    /// Gives back the budget slot of an admitted URL that produced no page
    ///
    /// Returns `true` when the URL has failed at most `requeue_limit` times;
    /// it is then removed from the visited set so that a republished copy
    /// can be admitted again. Otherwise it stays visited for the rest of the
    /// run.
    pub fn release_admission(&self, url: &str, requeue_limit: u32) -> bool {
        let mut inner = self.lock();
        inner.reserved = inner.reserved.saturating_sub(1);

        let failures = inner.failures.entry(url.to_string()).or_insert(0);
        *failures += 1;
        if *failures > requeue_limit {
            return false;
        }

        inner.visited.remove(url);
        inner.order.retain(|u| u != url);
        true
    }

    /// Best-effort publish guard: unvisited and budget not yet spent
    ///
    /// Admission re-checks both conditions, so a stale `true` is harmless.
    pub fn should_publish(&self, url: &str) -> bool {
        let inner = self.lock();
        !inner.visited.contains(url) && inner.pages_crawled < self.max_pages
    }

    pub fn should_stop(&self) -> bool {
        self.lock().pages_crawled >= self.max_pages
    }

    /// Sets the stop flag; returns `true` only for the call that set it
    pub fn request_stop(&self) -> bool {
        let mut inner = self.lock();
        let first = !inner.stopped;
        inner.stopped = true;
        first
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    pub fn pages_crawled(&self) -> u64 {
        self.lock().pages_crawled
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    /// Visited URLs in admission order
    pub fn visited(&self) -> Vec<String> {
        self.lock().order.clone()
    }
}
