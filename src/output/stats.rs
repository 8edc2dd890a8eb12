//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{RunRecord, SqliteRepository, StorageResult};

/// Number of repositories listed in the leaderboard
pub const TOP_REPOSITORIES: usize = 10;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of repositories stored
    pub total_repositories: u64,

    /// Ranges abandoned across all runs
    pub abandoned_ranges: u64,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Most-starred repositories as `(owner/name, stars)`
    pub top_repositories: Vec<(String, u64)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The database to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &SqliteRepository) -> StorageResult<HarvestStatistics> {
    Ok(HarvestStatistics {
        total_repositories: storage.count_repositories()?,
        abandoned_ranges: storage.count_abandoned_ranges()?,
        latest_run: storage.latest_run()?,
        top_repositories: storage.top_repositories(TOP_REPOSITORIES)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Repositories stored: {}", stats.total_repositories);
    println!("  Abandoned ranges: {}", stats.abandoned_ranges);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Persisted: {} / {}", run.persisted, run.target_count);
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded yet."),
    }
    println!();

    if !stats.top_repositories.is_empty() {
        println!("Top Repositories:");
        for (rank, (name, stars)) in stats.top_repositories.iter().enumerate() {
            println!("  {:>2}. {} ({} stars)", rank + 1, name, stars);
        }
    }
}
