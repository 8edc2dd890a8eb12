//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the batch loop that drives a crawl to completion:
//! - Seeding the frontier with the full key range
//! - Running one range worker per popped range, concurrently
//! - Collecting worker outcomes into a [`CrawlReport`]
//! - Sleeping once per batch when the shared quota is exhausted

use crate::client::SearchClient;
use crate::config::Config;
use crate::crawler::frontier::{Frontier, KeyRange};
use crate::crawler::progress::Progress;
use crate::crawler::retry::quota_wait;
use crate::crawler::worker::{CrawlShared, RangeOutcome, RangeWorker};
use crate::storage::{RunStatus, SharedRepository};
use crate::ConfigError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Search key the ranges partition
pub const KEY_FIELD: &str = "stars";

/// Engine settings derived from the configuration
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub key_field: String,
    pub initial_range: KeyRange,
    pub result_cap: u64,
    pub concurrency_limit: usize,
    pub page_size: u32,
    pub inter_request_delay: Duration,
    pub max_consecutive_errors: u32,
    pub range_retry_base: Duration,
    pub rate_limit_buffer: Duration,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let crawler = &config.crawler;
        let initial_range = KeyRange::new(crawler.min_key, crawler.max_key).ok_or_else(|| {
            ConfigError::Validation(format!(
                "min-key ({}) must not exceed max-key ({})",
                crawler.min_key, crawler.max_key
            ))
        })?;

        Ok(Self {
            key_field: KEY_FIELD.to_string(),
            initial_range,
            result_cap: crawler.result_cap,
            concurrency_limit: crawler.concurrency_limit.max(1) as usize,
            page_size: config.api.page_size,
            inter_request_delay: crawler.inter_request_delay(),
            max_consecutive_errors: crawler.max_consecutive_errors,
            range_retry_base: crawler.range_retry_base(),
            rate_limit_buffer: crawler.rate_limit_buffer(),
        })
    }
}

/// What a finished crawl achieved
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub target: u64,
    pub persisted: u64,
    pub pages_fetched: u64,
    pub batches: u64,
    pub splits: u64,
    pub drained: u64,
    /// Ranges given up on, with the last failure seen
    pub abandoned: Vec<(KeyRange, String)>,
    pub rate_limit_waits: u64,
    pub worker_failures: u64,
    /// Ranges still queued when the crawl stopped
    pub unvisited: usize,
}

impl CrawlReport {
    pub fn target_reached(&self) -> bool {
        self.persisted >= self.target
    }

    /// Status to record for the run
    ///
    /// Any range given up on, or lost to a failed worker, leaves part of the
    /// key space uncrawled and makes the run partial.
    pub fn run_status(&self) -> RunStatus {
        if self.abandoned.is_empty() && self.worker_failures == 0 {
            RunStatus::Completed
        } else {
            RunStatus::Partial
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    client: Arc<dyn SearchClient>,
    repository: SharedRepository,
    settings: CrawlSettings,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `client` - Search API used by every range worker
    /// * `repository` - Persistence target shared by the workers
    /// * `settings` - Engine settings, usually from [`CrawlSettings::from_config`]
    pub fn new(
        client: Arc<dyn SearchClient>,
        repository: SharedRepository,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            client,
            repository,
            settings,
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Crawls until `target_count` entities are persisted or the frontier is empty
    ///
    /// Range failures never abort the crawl; they show up in the report and the logs.
    pub async fn crawl(&self, target_count: u64) -> CrawlReport {
        self.crawl_with_progress(Arc::new(Progress::new(target_count)))
            .await
    }

    /// Like [`Coordinator::crawl`], with the progress counter owned by the caller
    ///
    /// Lets the caller read the persisted count even if the crawl future is
    /// dropped part way through.
    pub async fn crawl_with_progress(&self, progress: Arc<Progress>) -> CrawlReport {
        let target_count = progress.target();
        let shared = Arc::new(CrawlShared {
            client: Arc::clone(&self.client),
            repository: Arc::clone(&self.repository),
            frontier: Frontier::seeded(self.settings.initial_range),
            progress,
            settings: self.settings.clone(),
        });

        let mut report = CrawlReport {
            target: target_count,
            ..CrawlReport::default()
        };
        let start_time = std::time::Instant::now();

        tracing::info!(
            "Starting crawl of {} (target {}, concurrency {})",
            self.settings.initial_range.predicate(&self.settings.key_field),
            target_count,
            self.settings.concurrency_limit
        );

        while !shared.progress.is_complete() {
            let batch = shared.frontier.pop_batch(self.settings.concurrency_limit);
            if batch.is_empty() {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            }

            report.batches += 1;
            tracing::debug!(
                "Batch {}: {} ranges, {} queued",
                report.batches,
                batch.len(),
                shared.frontier.len()
            );

            let reset_at = Self::run_batch(&shared, batch, &mut report).await;

            if let Some(reset_at) = reset_at {
                let wait = quota_wait(reset_at, Utc::now(), self.settings.rate_limit_buffer);
                report.rate_limit_waits += 1;
                tracing::warn!(
                    "Rate limit exhausted, sleeping {:?} until {} plus buffer",
                    wait,
                    reset_at
                );
                tokio::time::sleep(wait).await;
            }

            tracing::info!(
                "Progress: {} / {} persisted, {} ranges queued, {:.1}s elapsed",
                shared.progress.persisted(),
                target_count,
                shared.frontier.len(),
                start_time.elapsed().as_secs_f64()
            );
        }

        report.persisted = shared.progress.persisted();
        report.unvisited = shared.frontier.len();

        tracing::info!(
            "Crawl finished: {} persisted, {} pages, {} splits, {} abandoned ranges in {:?}",
            report.persisted,
            report.pages_fetched,
            report.splits,
            report.abandoned.len(),
            start_time.elapsed()
        );

        report
    }

    /// Runs one worker per range and waits for all of them
    ///
    /// Returns the latest quota reset time reported by a rate-limited worker.
    async fn run_batch(
        shared: &Arc<CrawlShared>,
        batch: Vec<KeyRange>,
        report: &mut CrawlReport,
    ) -> Option<DateTime<Utc>> {
        let mut workers = JoinSet::new();
        for range in batch {
            workers.spawn(RangeWorker::new(range, Arc::clone(shared)).run());
        }

        let mut latest_reset: Option<DateTime<Utc>> = None;
        while let Some(joined) = workers.join_next().await {
            let worker = match joined {
                Ok(worker) => worker,
                Err(e) => {
                    tracing::error!("Range worker failed: {}", e);
                    report.worker_failures += 1;
                    continue;
                }
            };

            report.pages_fetched += worker.pages_fetched;
            match worker.outcome {
                RangeOutcome::Split { .. } => report.splits += 1,
                RangeOutcome::Drained => report.drained += 1,
                RangeOutcome::RateLimited { reset_at } => {
                    latest_reset = Some(latest_reset.map_or(reset_at, |r| r.max(reset_at)));
                }
                RangeOutcome::Abandoned { reason } => report.abandoned.push((worker.range, reason)),
            }
        }

        latest_reset
    }
}
