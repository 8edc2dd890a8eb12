//! Storage traits and error types
//!
//! This module defines the trait the crawl engine persists through and the
//! associated error types.

use crate::model::RepoEntity;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence target for crawled repositories
///
/// `bulk_upsert` must be idempotent and keyed by the stable repository ID:
/// writing the same entity twice changes nothing but its last-crawled time.
pub trait Repository: Send {
    /// Inserts or updates all entities and returns how many were written
    fn bulk_upsert(&mut self, entities: &[RepoEntity]) -> StorageResult<usize>;
}

/// Repository handle shared by all range workers
pub type SharedRepository = Arc<Mutex<dyn Repository>>;
