//! Integration tests for the crawler
//!
//! These tests drive the full worker pool over an in-memory queue and a
//! scripted page source, so every crawl is deterministic and offline.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use webscour::config::Config;
use webscour::crawler::{Coordinator, FetchError, PageSource, SourceResponse, StopReason};
use webscour::queue::{publish_seeds, Broker, SqliteBroker};

const SITE: &str = "http://site.test";

/// Serves canned pages and records every request
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, String>,
    /// Per-URL response delay
    delays: HashMap<String, Duration>,
    /// URLs answered with a 500
    broken: Vec<String>,
    calls: Mutex<Vec<String>>,
    /// When set, every request checks that no consumer holds two deliveries
    watch: Option<(Arc<dyn Broker>, Vec<String>)>,
    max_unacked: AtomicU64,
}

impl FakeSite {
    fn new() -> Self {
        Self::default()
    }

    fn page(mut self, path: &str, links: &[&str]) -> Self {
        let anchors: String = links
            .iter()
            .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
            .collect();
        let body = format!("<html><body><h1>{}</h1>{}</body></html>", path, anchors);
        self.pages.insert(format!("{}{}", SITE, path), body);
        self
    }

    fn slow(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(format!("{}{}", SITE, path), delay);
        self
    }

    fn broken(mut self, path: &str, delay: Duration) -> Self {
        self.broken.push(format!("{}{}", SITE, path));
        self.slow(path, delay)
    }

    fn watching(mut self, broker: Arc<dyn Broker>, consumers: Vec<String>) -> Self {
        self.watch = Some((broker, consumers));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for FakeSite {
    async fn get(&self, url: &str) -> Result<SourceResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some((broker, consumers)) = &self.watch {
            for consumer in consumers {
                let held = broker.unacked_by(consumer).unwrap();
                self.max_unacked.fetch_max(held, Ordering::SeqCst);
            }
            // Let the other workers reach the queue while this one is busy
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        if self.broken.iter().any(|b| b == url) {
            return Ok(SourceResponse::new(500, "server error"));
        }

        match self.pages.get(url) {
            Some(body) => Ok(SourceResponse::new(200, body.clone())),
            None => Ok(SourceResponse::new(404, "")),
        }
    }
}

/// Creates a test configuration writing into `tmp`
fn create_test_config(tmp: &TempDir, max_pages: u64, workers: usize) -> Config {
    let mut config = Config::default();
    config.crawler.max_pages = max_pages;
    config.crawler.num_workers = workers;
    config.crawler.idle_timeout_secs = 1;
    config.fetcher.max_attempts = 1;
    config.fetcher.backoff_ms = 0;
    config.fetcher.timeout_ms = 1_000;
    config.queue.poll_interval_ms = 10;
    config.output.pages_dir = tmp.path().join("pages").display().to_string();
    config.output.visited_path = tmp.path().join("visited.txt").display().to_string();
    config
}

fn url(path: &str) -> String {
    format!("{}{}", SITE, path)
}

fn count_saved_pages(tmp: &TempDir) -> usize {
    std::fs::read_dir(tmp.path().join("pages"))
        .unwrap()
        .filter(|entry| {
            entry
                .as_ref()
                .map(|e| e.path().extension().is_some_and(|ext| ext == "html"))
                .unwrap_or(false)
        })
        .count()
}

#[tokio::test]
async fn test_budget_stops_crawl_after_two_pages() {
    let tmp = TempDir::new().unwrap();
    let links: Vec<String> = ["/a", "/b", "/c", "/d", "/e"]
        .iter()
        .map(|p| url(p))
        .collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    let site = Arc::new(
        FakeSite::new()
            .page("/", &link_refs)
            .page("/a", &[])
            .page("/b", &[])
            .page("/c", &[])
            .page("/d", &[])
            .page("/e", &[]),
    );

    let broker: Arc<dyn Broker> = Arc::new(SqliteBroker::open_in_memory().unwrap());
    let config = create_test_config(&tmp, 2, 1);
    publish_seeds(broker.as_ref(), &config.queue.name, &[url("/")]).unwrap();

    let coordinator = Coordinator::with_components(config, Arc::clone(&broker), site.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::BudgetReached));
    assert_eq!(summary.pages_crawled, 2);
    assert_eq!(summary.links_published, 5);
    assert_eq!(site.calls().len(), 2);
    assert_eq!(count_saved_pages(&tmp), 2);
    assert_eq!(summary.frontier_remaining, 4);

    let visited = std::fs::read_to_string(tmp.path().join("visited.txt")).unwrap();
    assert_eq!(visited, format!("{}\n{}\n", url("/"), url("/a")));
}

#[tokio::test]
async fn test_workers_racing_to_budget_save_exactly_max_pages() {
    let tmp = TempDir::new().unwrap();
    let paths: Vec<String> = (1..=6).map(|i| format!("/fan{}", i)).collect();
    let links: Vec<String> = paths.iter().map(|p| url(p)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    let mut site = FakeSite::new().page("/", &link_refs);
    for path in &paths {
        site = site
            .page(path, &[])
            .slow(path, Duration::from_millis(20));
    }
    let site = Arc::new(site);

    let broker: Arc<dyn Broker> = Arc::new(SqliteBroker::open_in_memory().unwrap());
    let config = create_test_config(&tmp, 2, 3);
    publish_seeds(broker.as_ref(), &config.queue.name, &[url("/")]).unwrap();

    let coordinator = Coordinator::with_components(config, Arc::clone(&broker), site.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::BudgetReached));
    assert_eq!(summary.pages_crawled, 2);
    assert_eq!(count_saved_pages(&tmp), 2);
    // Admission reserves a slot before fetching, so no fetch is wasted
    assert_eq!(site.calls().len(), 2);
    assert_eq!(summary.urls_admitted, 2);
}

#[tokio::test]
async fn test_url_deferred_on_reserved_budget_is_crawled_after_failure() {
    let tmp = TempDir::new().unwrap();
    let site = Arc::new(
        FakeSite::new()
            .broken("/bad", Duration::from_millis(200))
            .page("/good", &[]),
    );

    let broker: Arc<dyn Broker> = Arc::new(SqliteBroker::open_in_memory().unwrap());
    let config = create_test_config(&tmp, 1, 2);
    publish_seeds(broker.as_ref(), &config.queue.name, &[url("/bad"), url("/good")]).unwrap();

    let coordinator = Coordinator::with_components(config, Arc::clone(&broker), site.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::BudgetReached));
    assert_eq!(summary.pages_crawled, 1);
    assert_eq!(count_saved_pages(&tmp), 1);
    assert!(site.calls().contains(&url("/good")));
    assert!(site.calls().len() <= 2);

    let visited = std::fs::read_to_string(tmp.path().join("visited.txt")).unwrap();
    assert!(visited.lines().any(|line| line == url("/good")));
}

#[tokio::test]
async fn test_republished_url_is_crawled_once() {
    let tmp = TempDir::new().unwrap();
    let home = url("/");
    let about = url("/about");

    // Both pages link to each other and to themselves
    let site = Arc::new(
        FakeSite::new()
            .page("/", &[&home, &about])
            .page("/about", &[&home, &about]),
    );

    let broker: Arc<dyn Broker> = Arc::new(SqliteBroker::open_in_memory().unwrap());
    let config = create_test_config(&tmp, 10, 2);
    publish_seeds(broker.as_ref(), &config.queue.name, &[&home, &home, &home]).unwrap();

    let coordinator = Coordinator::with_components(config, Arc::clone(&broker), site.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(summary.pages_crawled, 2);
    assert!(summary.duplicates_skipped >= 2);

    let mut calls = site.calls();
    calls.sort();
    assert_eq!(calls, vec![home, about]);
    assert_eq!(count_saved_pages(&tmp), 2);
}

#[tokio::test]
async fn test_fair_dispatch_holds_one_task_per_worker() {
    let tmp = TempDir::new().unwrap();
    let paths: Vec<String> = (0..10).map(|i| format!("/p{}", i)).collect();

    let broker: Arc<dyn Broker> = Arc::new(SqliteBroker::open_in_memory().unwrap());
    let consumers = (1..=2)
        .map(|id| format!("worker-{}-{}", std::process::id(), id))
        .collect();

    let mut site = FakeSite::new().watching(Arc::clone(&broker), consumers);
    for path in &paths {
        site = site.page(path, &[]);
    }
    let site = Arc::new(site);

    let config = create_test_config(&tmp, 100, 2);
    let seeds: Vec<String> = paths.iter().map(|p| url(p)).collect();
    publish_seeds(broker.as_ref(), &config.queue.name, &seeds).unwrap();

    let coordinator = Coordinator::with_components(config, Arc::clone(&broker), site.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.pages_crawled, 10);
    assert_eq!(site.calls().len(), 10);
    assert_eq!(site.max_unacked.load(Ordering::SeqCst), 1);
    assert!(broker.stats(&coordinator.config().queue.name).unwrap().is_drained());
}

#[tokio::test]
async fn test_failed_fetch_is_abandoned_by_default() {
    let tmp = TempDir::new().unwrap();
    let missing = url("/missing");
    let site = Arc::new(FakeSite::new().page("/", &[&missing]));

    let broker: Arc<dyn Broker> = Arc::new(SqliteBroker::open_in_memory().unwrap());
    let config = create_test_config(&tmp, 5, 1);
    publish_seeds(broker.as_ref(), &config.queue.name, &[url("/")]).unwrap();

    let coordinator = Coordinator::with_components(config, Arc::clone(&broker), site.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.pages_crawled, 1);
    assert_eq!(summary.fetch_failures, 1);
    assert_eq!(summary.requeued, 0);
    assert_eq!(summary.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(summary.frontier_remaining, 0);
    // The failed URL keeps its visited mark
    assert_eq!(summary.urls_admitted, 2);
}

#[tokio::test]
async fn test_failed_fetch_requeued_up_to_limit() {
    let tmp = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::new());

    let broker: Arc<dyn Broker> = Arc::new(SqliteBroker::open_in_memory().unwrap());
    let mut config = create_test_config(&tmp, 5, 1);
    config.crawler.failed_fetch_requeues = 1;
    publish_seeds(broker.as_ref(), &config.queue.name, &[url("/flaky")]).unwrap();

    let coordinator = Coordinator::with_components(config, Arc::clone(&broker), site.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(site.calls(), vec![url("/flaky"), url("/flaky")]);
    assert_eq!(summary.fetch_failures, 2);
    assert_eq!(summary.requeued, 1);
    assert_eq!(summary.pages_crawled, 0);
    assert_eq!(count_saved_pages(&tmp), 0);
}

#[tokio::test]
async fn test_external_stop_ends_crawl() {
    let tmp = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::new());

    let broker: Arc<dyn Broker> = Arc::new(SqliteBroker::open_in_memory().unwrap());
    let mut config = create_test_config(&tmp, 5, 3);
    config.crawler.idle_timeout_secs = 0;

    let coordinator = Coordinator::with_components(config, broker, site);
    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.trigger(StopReason::Interrupted);
    });

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::Interrupted));
    assert_eq!(summary.workers, 3);
    assert_eq!(summary.failed_workers, 0);
}
