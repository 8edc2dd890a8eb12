//! Crawl engine for partitioned search
//!
//! This module contains the core crawling logic, including:
//! - Key ranges and the frontier of ranges still to crawl
//! - The per-range pagination state machine
//! - Shared progress against the target count
//! - Two-tier retry and backoff
//! - Overall crawl coordination

mod coordinator;
mod frontier;
mod progress;
pub mod retry;
mod worker;

#[cfg(test)]
mod testing;

pub use coordinator::{Coordinator, CrawlReport, CrawlSettings, KEY_FIELD};
pub use frontier::{Frontier, KeyRange};
pub use progress::{Progress, Reservation};
pub use worker::{CrawlShared, RangeOutcome, RangeWorker, WorkerReport};

use crate::client::SearchClient;
use crate::config::Config;
use crate::storage::SharedRepository;
use crate::ConfigError;
use std::sync::Arc;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Derive the engine settings from the configuration
/// 2. Seed the frontier with the configured key range
/// 3. Crawl range batches until the target is reached or the frontier is empty
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `client` - Search API client
/// * `repository` - Where harvested repositories are persisted
/// * `target_count` - Number of repositories to persist
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished; partial coverage is reported, not raised
/// * `Err(ConfigError)` - The configuration cannot drive a crawl
pub async fn crawl(
    config: &Config,
    client: Arc<dyn SearchClient>,
    repository: SharedRepository,
    target_count: u64,
) -> Result<CrawlReport, ConfigError> {
    let settings = CrawlSettings::from_config(config)?;
    Ok(Coordinator::new(client, repository, settings)
        .crawl(target_count)
        .await)
}
