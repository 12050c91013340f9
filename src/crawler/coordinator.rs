//! Crawler coordinator - worker pool orchestration and global stop
//!
//! This module ties the crawl together:
//! - Declaring the frontier queue, dropping transient queues and reclaiming
//!   deliveries left by a crash
//! - Spawning one worker per configured slot, each with its own consumer
//! - Owning the process-wide stop signal every worker observes
//! - Ending the crawl on budget, an idle frontier, or an interrupt
//! - Writing the visited report and building the summary

use crate::config::{validate, Config};
use crate::crawler::fetcher::{build_http_client, Fetcher, HttpSource, PageSource, RetryPolicy};
use crate::crawler::worker::{Worker, WorkerReport, WorkerShared};
use crate::output::{write_visited_report, CrawlSummary, PageStore};
use crate::queue::{Broker, Consumer, SqliteBroker};
use crate::state::CrawlState;
use crate::url::LinkFilter;
use crate::Result;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// Why the crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The page budget was spent
    BudgetReached,
    /// The frontier stayed empty for the idle timeout
    FrontierExhausted,
    /// Stopped from outside, e.g. Ctrl-C
    Interrupted,
    /// Every worker left its loop on its own
    WorkersExited,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::BudgetReached => "page budget reached",
            StopReason::FrontierExhausted => "frontier exhausted",
            StopReason::Interrupted => "interrupted",
            StopReason::WorkersExited => "all workers exited",
        };
        f.write_str(text)
    }
}

/// Process-wide cooperative stop signal
///
/// Only the first `trigger` takes effect, however many workers cross the
/// budget at once. Workers see the signal at their next pull from the queue.
pub struct StopSignal {
    state: Arc<CrawlState>,
    tx: watch::Sender<bool>,
    reason: Mutex<Option<StopReason>>,
}

impl StopSignal {
    pub fn new(state: Arc<CrawlState>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state,
            tx,
            reason: Mutex::new(None),
        }
    }

    /// Requests a global stop; returns `true` only for the call that stopped
    pub fn trigger(&self, reason: StopReason) -> bool {
        {
            let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.state.request_stop() {
                return false;
            }
            *slot = Some(reason);
        }

        self.tx.send_replace(true);
        tracing::info!("Stopping crawl: {}", reason);
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Reason recorded by the first trigger, if any
    pub fn reason(&self) -> Option<StopReason> {
        *self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    broker: Arc<dyn Broker>,
    source: Arc<dyn PageSource>,
    state: Arc<CrawlState>,
    stop: Arc<StopSignal>,
}

impl Coordinator {
    /// Creates a coordinator backed by the on-disk queue and real HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Queue database opened and HTTP client built
    /// * `Err(ScourError)` - Failed to initialize
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;

        let broker = SqliteBroker::open(Path::new(&config.queue.database_path))?;

        let timeout = Duration::from_millis(config.fetcher.timeout_ms);
        let client = build_http_client(&config.user_agent, timeout)?;
        let source = HttpSource::new(client, timeout);

        Ok(Self::with_components(
            config,
            Arc::new(broker),
            Arc::new(source),
        ))
    }

    /// Creates a coordinator over an explicit queue and page source
    pub fn with_components(
        config: Config,
        broker: Arc<dyn Broker>,
        source: Arc<dyn PageSource>,
    ) -> Self {
        let state = Arc::new(CrawlState::new(config.crawler.max_pages));
        let stop = Arc::new(StopSignal::new(Arc::clone(&state)));

        Self {
            config: Arc::new(config),
            broker,
            source,
            state,
            stop,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn broker(&self) -> Arc<dyn Broker> {
        Arc::clone(&self.broker)
    }

    pub fn state(&self) -> Arc<CrawlState> {
        Arc::clone(&self.state)
    }

    /// Handle for stopping the crawl from outside, e.g. a signal handler
    pub fn stop_handle(&self) -> Arc<StopSignal> {
        Arc::clone(&self.stop)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.queue.poll_interval_ms.max(1))
    }

    /// Runs the worker pool until the crawl stops
    ///
    /// Per-URL failures never end the run. Returns an error only when the
    /// queue or the page directory cannot be set up.
    pub async fn run(&self) -> Result<CrawlSummary> {
        let started = Instant::now();
        let queue = self.config.queue.name.clone();

        let purged = self.broker.purge_transient()?;
        if purged > 0 {
            tracing::debug!("Dropped {} messages of transient queues", purged);
        }

        self.broker.declare(&queue, true)?;
        let recovered = self.broker.recover_all(&queue)?;
        if recovered > 0 {
            tracing::warn!(
                "Returned {} deliveries from a previous run to {}",
                recovered,
                queue
            );
        }

        let pages = Arc::new(PageStore::create(&self.config.output.pages_dir).await?);
        let fetcher = Arc::new(Fetcher::new(
            Arc::clone(&self.source),
            RetryPolicy::from(&self.config.fetcher),
        ));

        let shared = WorkerShared {
            state: Arc::clone(&self.state),
            fetcher,
            filter: LinkFilter::new(self.config.crawler.host_policy.into()),
            pages,
            stop: Arc::clone(&self.stop),
            requeue_limit: self.config.crawler.failed_fetch_requeues,
            defer_delay: self.poll_interval(),
        };

        let num_workers = self.config.crawler.num_workers;
        let pid = std::process::id();
        let mut workers = JoinSet::new();
        for id in 1..=num_workers {
            let consumer = Consumer::new(
                Arc::clone(&self.broker),
                queue.clone(),
                format!("worker-{}-{}", pid, id),
                self.config.queue.prefetch,
                self.poll_interval(),
            );
            workers.spawn(Worker::new(id, consumer, shared.clone()).run());
        }

        tracing::info!(
            "Started {} workers on queue {} (budget: {} pages)",
            num_workers,
            queue,
            self.state.max_pages()
        );

        let (total, failed_workers) = self.supervise(&queue, workers).await;

        if self.stop.reason().is_none() {
            self.stop.trigger(StopReason::WorkersExited);
        }

        let visited = self.state.visited();
        let visited_path = Path::new(&self.config.output.visited_path);
        match write_visited_report(visited_path, &visited).await {
            Ok(()) => tracing::info!(
                "Wrote {} visited URLs to {}",
                visited.len(),
                visited_path.display()
            ),
            Err(e) => tracing::error!(
                "Failed to write visited report {}: {}",
                visited_path.display(),
                e
            ),
        }

        let frontier_remaining = match self.broker.stats(&queue) {
            Ok(stats) => stats.ready,
            Err(e) => {
                tracing::warn!("Could not read queue stats: {}", e);
                0
            }
        };

        let summary = CrawlSummary {
            workers: num_workers,
            pages_crawled: self.state.pages_crawled(),
            max_pages: self.state.max_pages(),
            elapsed: started.elapsed(),
            stop_reason: self.stop.reason(),
            urls_admitted: visited.len(),
            duplicates_skipped: total.duplicates,
            budget_skips: total.budget_skips,
            deferred: total.deferred,
            fetch_failures: total.fetch_failures,
            save_failures: total.save_failures,
            links_published: total.links_published,
            requeued: total.requeued,
            failed_workers,
            frontier_remaining,
        };
        summary.log();

        Ok(summary)
    }

    /// Collects worker reports and watches the frontier for idleness
    async fn supervise(
        &self,
        queue: &str,
        mut workers: JoinSet<WorkerReport>,
    ) -> (WorkerReport, usize) {
        let mut total = WorkerReport::default();
        let mut failed_workers = 0;

        let idle_timeout = self.config.crawler.idle_timeout();
        let mut ticker = tokio::time::interval(self.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut idle_since: Option<Instant> = None;

        loop {
            tokio::select! {
                joined = workers.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok(report)) => {
                            if report.exit_error.is_some() {
                                failed_workers += 1;
                            }
                            total.merge(&report);
                        }
                        Some(Err(e)) => {
                            tracing::error!("Worker task ended abnormally: {}", e);
                            failed_workers += 1;
                        }
                    }
                }
                _ = ticker.tick(), if idle_timeout.is_some() && !self.stop.is_triggered() => {
                    if let Some(limit) = idle_timeout {
                        self.check_idle(queue, limit, &mut idle_since);
                    }
                }
            }
        }

        (total, failed_workers)
    }

    /// Stops the crawl once the queue has been drained for `limit`
    fn check_idle(&self, queue: &str, limit: Duration, idle_since: &mut Option<Instant>) {
        match self.broker.stats(queue) {
            Ok(stats) if stats.is_drained() => {
                let since = *idle_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= limit {
                    tracing::info!("Frontier empty for {:?}", limit);
                    self.stop.trigger(StopReason::FrontierExhausted);
                }
            }
            Ok(_) => *idle_since = None,
            Err(e) => tracing::warn!("Could not read queue stats: {}", e),
        }
    }
}
