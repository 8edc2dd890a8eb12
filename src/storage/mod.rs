//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent upserts of harvested repositories
//! - Run tracking and abandoned-range bookkeeping
//! - Read-back queries for statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteRepository;
pub use traits::{Repository, SharedRepository, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens a repository database
pub fn open_storage(path: &Path) -> StorageResult<SqliteRepository> {
    SqliteRepository::new(path)
}

/// A repository row as stored, including bookkeeping timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRepository {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub stars: u64,
    pub updated_at: String,
    pub first_seen_at: String,
    /// Last time a mutable field actually changed
    pub last_changed_at: String,
    /// Last time the crawl saw this repository
    pub last_crawled_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub target_count: u64,
    pub persisted: u64,
    pub status: RunStatus,
}

/// Represents a range given up during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedRangeRecord {
    pub run_id: i64,
    pub low: u64,
    pub high: u64,
    pub reason: String,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished, but some ranges were abandoned or lost
    Partial,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
