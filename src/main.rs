//! Star-Harvest main entry point
//!
//! This is the command-line interface for the Star-Harvest repository harvester.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use star_harvest::client::GitHubClient;
use star_harvest::config::{
    load_config_with_hash, resolve_bootstrap, resolve_database_path, validate, Config,
};
use star_harvest::crawler::{Coordinator, CrawlSettings, Progress};
use star_harvest::output::{load_statistics, print_crawl_report, print_statistics};
use star_harvest::storage::{open_storage, RunStatus, SharedRepository, SqliteRepository};
use tracing_subscriber::EnvFilter;

/// Star-Harvest: an exhaustive GitHub repository harvester
///
/// Star-Harvest enumerates repositories through the GitHub search API by
/// partitioning the star-count range so that no single query hits the
/// result cap, and stores them in SQLite.
#[derive(Parser, Debug)]
#[command(name = "star-harvest")]
#[command(version)]
#[command(about = "An exhaustive GitHub repository harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the number of repositories to persist
    #[arg(long, value_name = "N")]
    target: Option<u64>,

    /// Override the number of ranges crawled simultaneously
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Validate config and show the effective settings without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match load_config_with_hash(cli.config.as_deref()) {
        Ok((cfg, hash)) => {
            match &cli.config {
                Some(path) => tracing::info!(
                    "Configuration loaded from {} (hash: {})",
                    path.display(),
                    hash
                ),
                None => tracing::info!("No configuration file given, using defaults"),
            }
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(target) = cli.target {
        config.crawler.target_count = target;
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency_limit = concurrency;
    }
    validate(&config).context("invalid command-line override")?;

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` wins over the flags when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "star_harvest=info,warn",
            1 => "star_harvest=debug,info",
            2 => "star_harvest=trace,debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Star-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Target count: {}", config.crawler.target_count);
    println!("  Concurrency limit: {}", config.crawler.concurrency_limit);
    println!(
        "  Initial range: stars:{}..{}",
        config.crawler.min_key, config.crawler.max_key
    );
    println!("  Result cap: {}", config.crawler.result_cap);
    println!(
        "  Inter-request delay: {}ms",
        config.crawler.inter_request_delay_ms
    );
    println!(
        "  Range retries: {} (unit {}s)",
        config.crawler.max_consecutive_errors, config.crawler.range_retry_base_secs
    );
    println!(
        "  Rate limit buffer: {}s",
        config.crawler.rate_limit_buffer_secs
    );

    println!("\nAPI:");
    println!("  Endpoint: {}", config.api.endpoint);
    println!(
        "  Page size: {} (floor {})",
        config.api.page_size, config.api.min_page_size
    );
    println!(
        "  Fetch retries: {} ({}ms base, {}ms max, {}ms jitter)",
        config.api.max_retries,
        config.api.retry_base_delay_ms,
        config.api.retry_max_delay_ms,
        config.api.retry_jitter_ms
    );
    println!("  Quota threshold: {}", config.api.quota_threshold);
    println!("  User agent: {}", config.api.user_agent);

    println!("\nBootstrap:");
    match resolve_bootstrap(config, env_lookup) {
        Ok(bootstrap) => {
            println!("  Token: <redacted>");
            println!("  Database: {}", bootstrap.database_path);
            println!("\n✓ Configuration is valid");
        }
        Err(e) => {
            println!("  {}", e);
            println!("\n✗ A crawl would refuse to start");
        }
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let database_path = resolve_database_path(config, env_lookup)?;
    println!("Database: {}\n", database_path);

    let storage = SqliteRepository::new(Path::new(&database_path))
        .with_context(|| format!("failed to open {}", database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let bootstrap = resolve_bootstrap(&config, env_lookup)?;
    let settings = CrawlSettings::from_config(&config)?;
    let target = config.crawler.target_count;

    let client = GitHubClient::new(&config.api, &bootstrap.token)?;
    let login = client
        .validate_token()
        .await
        .context("token validation failed")?;
    tracing::info!("Authenticated as {}", login);

    let mut storage = open_storage(Path::new(&bootstrap.database_path))
        .with_context(|| format!("failed to open {}", bootstrap.database_path))?;
    let run_id = storage.create_run(config_hash, target)?;
    tracing::info!(
        "Started run {} into {}",
        run_id,
        bootstrap.database_path
    );

    let storage = Arc::new(Mutex::new(storage));
    let repository: SharedRepository = storage.clone();
    let coordinator = Coordinator::new(Arc::new(client), repository, settings);
    let progress = Arc::new(Progress::new(target));

    let finished = tokio::select! {
        report = coordinator.crawl_with_progress(Arc::clone(&progress)) => Some(report),
        _ = tokio::signal::ctrl_c() => None,
    };

    let mut storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
    match finished {
        Some(report) => {
            for (range, reason) in &report.abandoned {
                storage.record_abandoned_range(run_id, *range, reason)?;
            }
            let status = report.run_status();
            if status == RunStatus::Partial {
                tracing::warn!(
                    "Run {} is partial: {} ranges abandoned, {} workers failed",
                    run_id,
                    report.abandoned.len(),
                    report.worker_failures
                );
            }
            if !report.target_reached() {
                tracing::warn!(
                    "Target not reached: {} of {} repositories persisted",
                    report.persisted,
                    report.target
                );
            }
            storage.finish_run(run_id, status, report.persisted)?;
            print_crawl_report(run_id, &report);
            Ok(())
        }
        None => {
            let persisted = progress.persisted();
            tracing::warn!("Interrupted after {} repositories", persisted);
            storage.finish_run(run_id, RunStatus::Interrupted, persisted)?;
            bail!("crawl interrupted (run {} marked interrupted)", run_id)
        }
    }
}
