//! WebScour main entry point
//!
//! This is the command-line interface for the WebScour crawl worker pool.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use webscour::config::{load_config_with_hash, Config};
use webscour::crawler::{Coordinator, StopReason};
use webscour::output::print_summary;
use webscour::queue::{publish_seeds, Broker, SqliteBroker};

/// WebScour: a queue-mediated distributed web crawler
///
/// WebScour runs a pool of workers that pull URLs from a durable frontier
/// queue, save every fetched page, and republish discovered links until a
/// global page budget is spent.
#[derive(Parser, Debug)]
#[command(name = "webscour")]
#[command(version = "1.0.0")]
#[command(about = "A queue-mediated distributed web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Publish a seed URL to the frontier queue and exit (repeatable)
    #[arg(long = "seed", value_name = "URL", conflicts_with_all = ["dry_run", "stats"])]
    seeds: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show frontier queue statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if !cli.seeds.is_empty() {
        handle_seed(&config, &cli.seeds)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webscour=info,warn"),
            1 => EnvFilter::new("webscour=debug,info"),
            2 => EnvFilter::new("webscour=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config) {
    println!("=== WebScour Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Workers: {}", config.crawler.num_workers);
    println!("  Host policy: {:?}", config.crawler.host_policy);
    println!(
        "  Failed fetch requeues: {}",
        config.crawler.failed_fetch_requeues
    );
    match config.crawler.idle_timeout() {
        Some(timeout) => println!("  Idle timeout: {}s", timeout.as_secs()),
        None => println!("  Idle timeout: disabled"),
    }

    println!("\nFetcher:");
    println!("  Max attempts: {}", config.fetcher.max_attempts);
    println!("  Timeout: {}ms", config.fetcher.timeout_ms);
    println!("  Backoff: {}ms", config.fetcher.backoff_ms);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nQueue:");
    println!("  Database: {}", config.queue.database_path);
    println!("  Name: {}", config.queue.name);
    println!("  Prefetch: {}", config.queue.prefetch);

    println!("\nOutput:");
    println!("  Pages: {}", config.output.pages_dir);
    println!("  Visited report: {}", config.output.visited_path);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start {} workers on queue {}",
        config.crawler.num_workers, config.queue.name
    );
}

/// Handles the --stats mode: shows the state of the frontier queue
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.queue.database_path);

    let broker = open_broker(config)?;
    broker.declare(&config.queue.name, true)?;
    let stats = broker.stats(&config.queue.name)?;

    println!("Queue             : {}", config.queue.name);
    println!("Ready messages    : {}", stats.ready);
    println!("Unacknowledged    : {}", stats.unacked);

    Ok(())
}

/// Publishes seed URLs onto the configured queue
fn handle_seed(config: &Config, seeds: &[String]) -> anyhow::Result<()> {
    let broker = open_broker(config)?;
    let published = publish_seeds(&broker, &config.queue.name, seeds)?;
    tracing::info!(
        "Published {} of {} seeds to {}",
        published,
        seeds.len(),
        config.queue.name
    );
    Ok(())
}

fn open_broker(config: &Config) -> anyhow::Result<SqliteBroker> {
    SqliteBroker::open(Path::new(&config.queue.database_path)).with_context(|| {
        format!(
            "Failed to open queue database {}",
            config.queue.database_path
        )
    })
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Starting crawl with {} workers, budget {} pages",
        config.crawler.num_workers,
        config.crawler.max_pages
    );

    let coordinator = Coordinator::new(config)?;

    // Ctrl-C stops the pool at the next task boundary
    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight tasks");
            stop.trigger(StopReason::Interrupted);
        }
    });

    match coordinator.run().await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
