//! Crawl worker
//!
//! A worker is a loop over its own queue consumer. For each delivery it runs
//! admission, fetch, persist, account, discover, acknowledge and a stop
//! check. The crawl state lock is only taken inside `CrawlState` calls, never
//! across a fetch or a file write.

use crate::crawler::coordinator::{StopReason, StopSignal};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::extract_links;
use crate::output::PageStore;
use crate::queue::{Consumer, Delivery, QueueError};
use crate::state::{Admission, CrawlState};
use crate::url::LinkFilter;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Everything a worker shares with the rest of the pool
#[derive(Clone)]
pub struct WorkerShared {
    pub state: Arc<CrawlState>,
    pub fetcher: Arc<Fetcher>,
    pub filter: LinkFilter,
    pub pages: Arc<PageStore>,
    pub stop: Arc<StopSignal>,
    /// Republish budget for URLs whose fetch failed
    pub requeue_limit: u32,
    /// Pause after deferring a URL while the budget is fully reserved
    pub defer_delay: Duration,
}

/// What happened to one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Page saved and counted; `published` new links went to the frontier
    Saved { published: u64 },
    Duplicate,
    BudgetExceeded,
    /// Budget fully reserved by in-flight pages; the URL went back to the queue
    Deferred,
    /// All fetch attempts failed; `requeued` if the URL was republished
    FetchFailed { requeued: bool },
    /// The page could not be written to disk
    SaveFailed,
    /// The message body was not a UTF-8 URL
    InvalidTask,
}

/// Per-worker counters, merged by the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub tasks: u64,
    pub pages_saved: u64,
    pub duplicates: u64,
    pub budget_skips: u64,
    pub deferred: u64,
    pub fetch_failures: u64,
    pub save_failures: u64,
    pub requeued: u64,
    pub links_published: u64,
    pub invalid_tasks: u64,
    /// Set when the loop ended on a queue error instead of a stop signal
    pub exit_error: Option<String>,
}

impl WorkerReport {
    fn record(&mut self, outcome: &TaskOutcome) {
        self.tasks += 1;
        match outcome {
            TaskOutcome::Saved { published } => {
                self.pages_saved += 1;
                self.links_published += published;
            }
            TaskOutcome::Duplicate => self.duplicates += 1,
            TaskOutcome::BudgetExceeded => self.budget_skips += 1,
            TaskOutcome::Deferred => self.deferred += 1,
            TaskOutcome::FetchFailed { requeued } => {
                self.fetch_failures += 1;
                if *requeued {
                    self.requeued += 1;
                }
            }
            TaskOutcome::SaveFailed => self.save_failures += 1,
            TaskOutcome::InvalidTask => self.invalid_tasks += 1,
        }
    }

    /// Adds another worker's counters to this one
    pub fn merge(&mut self, other: &WorkerReport) {
        self.tasks += other.tasks;
        self.pages_saved += other.pages_saved;
        self.duplicates += other.duplicates;
        self.budget_skips += other.budget_skips;
        self.deferred += other.deferred;
        self.fetch_failures += other.fetch_failures;
        self.save_failures += other.save_failures;
        self.requeued += other.requeued;
        self.links_published += other.links_published;
        self.invalid_tasks += other.invalid_tasks;
    }
}

pub struct Worker {
    id: usize,
    consumer: Consumer,
    shared: WorkerShared,
    report: WorkerReport,
}

impl Worker {
    pub fn new(id: usize, consumer: Consumer, shared: WorkerShared) -> Self {
        Self {
            id,
            consumer,
            shared,
            report: WorkerReport::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Consumes until the stop signal fires or the queue fails
    ///
    /// A queue error ends only this worker. Dropping the consumer on return
    /// hands any unacknowledged delivery back to the queue.
    pub async fn run(mut self) -> WorkerReport {
        let mut shutdown = self.shared.stop.subscribe();
        tracing::info!("[WORKER-{}] Waiting for URLs...", self.id);

        loop {
            let delivery = match self.consumer.next(&mut shutdown).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => break,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            };

            match self.handle(&delivery).await {
                Ok(TaskOutcome::Deferred) => {
                    // Give the in-flight admissions time to save or fail
                    tokio::select! {
                        _ = tokio::time::sleep(self.shared.defer_delay) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }
        }

        tracing::debug!(
            "[WORKER-{}] Exiting after {} tasks ({} pages saved)",
            self.id,
            self.report.tasks,
            self.report.pages_saved
        );
        self.report
    }

    fn fail(&mut self, error: QueueError) {
        tracing::error!("[WORKER-{}] Queue failure, stopping: {}", self.id, error);
        self.report.exit_error = Some(error.to_string());
    }

    async fn handle(&mut self, delivery: &Delivery) -> Result<TaskOutcome, QueueError> {
        let outcome = self.process(delivery).await?;
        self.report.record(&outcome);

        // Every outcome is definitive for this delivery, including failures.
        // A deferred URL was already republished as a new message.
        self.consumer.ack(delivery.tag)?;

        if self.shared.state.should_stop() {
            self.shared.stop.trigger(StopReason::BudgetReached);
        }

        Ok(outcome)
    }

    async fn process(&mut self, delivery: &Delivery) -> Result<TaskOutcome, QueueError> {
        let url = match delivery.url() {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!("[WORKER-{}] Dropping undecodable task: {}", self.id, e);
                return Ok(TaskOutcome::InvalidTask);
            }
        };

        match self.shared.state.try_admit(&url) {
            Admission::Admitted => {}
            Admission::Duplicate => {
                tracing::debug!("[WORKER-{}] Already visited {}", self.id, url);
                return Ok(TaskOutcome::Duplicate);
            }
            Admission::BudgetExceeded => {
                tracing::debug!("[WORKER-{}] Budget reached, skipping {}", self.id, url);
                return Ok(TaskOutcome::BudgetExceeded);
            }
            Admission::BudgetReserved => {
                self.consumer.publish(url.as_bytes())?;
                tracing::debug!(
                    "[WORKER-{}] Budget held by in-flight pages, deferring {}",
                    self.id,
                    url
                );
                return Ok(TaskOutcome::Deferred);
            }
        }

        if delivery.redelivered {
            tracing::info!("[WORKER-{}] Crawling (redelivered) -> {}", self.id, url);
        } else {
            tracing::info!("[WORKER-{}] Crawling -> {}", self.id, url);
        }

        let body = match self.shared.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(failure) => {
                let requeued = self
                    .shared
                    .state
                    .release_admission(&url, self.shared.requeue_limit);
                if requeued {
                    self.consumer.publish(url.as_bytes())?;
                    tracing::warn!("[WORKER-{}] Requeued {}: {}", self.id, url, failure);
                } else {
                    tracing::warn!("[WORKER-{}] Abandoned {}: {}", self.id, url, failure);
                }
                return Ok(TaskOutcome::FetchFailed { requeued });
            }
        };

        let saved = match self.shared.pages.save(self.id, &url, body.as_bytes()).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!("[WORKER-{}] Failed to save {}: {}", self.id, url, e);
                self.shared.state.release_admission(&url, 0);
                return Ok(TaskOutcome::SaveFailed);
            }
        };

        let crawled = self.shared.state.record_page();
        tracing::info!(
            "[SAVED] {} ({}/{})",
            saved.path.display(),
            crawled,
            self.shared.state.max_pages()
        );

        let published = self.publish_links(&url, &body)?;
        Ok(TaskOutcome::Saved { published })
    }

    /// Sends every accepted, unvisited link back to the frontier
    fn publish_links(&self, page_url: &str, body: &str) -> Result<u64, QueueError> {
        let mut seen = HashSet::new();
        let mut published = 0;

        for link in extract_links(body) {
            let accepted = match self.shared.filter.filter(&link, page_url) {
                Ok(accepted) => accepted,
                Err(reason) => {
                    tracing::trace!("Rejected link {:?}: {}", link, reason);
                    continue;
                }
            };

            if !seen.insert(accepted.clone()) {
                continue;
            }

            if self.shared.state.should_publish(&accepted) {
                self.consumer.publish(accepted.as_bytes())?;
                published += 1;
            }
        }

        tracing::debug!(
            "[WORKER-{}] Published {} links from {}",
            self.id,
            published,
            page_url
        );
        Ok(published)
    }
}
