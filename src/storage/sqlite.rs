//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Repository trait,
//! plus the run bookkeeping and statistics queries used by the CLI.

use crate::crawler::KeyRange;
use crate::model::RepoEntity;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Repository, StorageError, StorageResult};
use crate::storage::{AbandonedRangeRecord, RunRecord, RunStatus, StoredRepository};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const UPSERT_SQL: &str = "
    INSERT INTO repositories
        (id, name, owner, stars, updated_at, first_seen_at, last_changed_at, last_crawled_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?6)
    ON CONFLICT(id) DO UPDATE SET
        last_changed_at = CASE
            WHEN name IS NOT excluded.name
              OR owner IS NOT excluded.owner
              OR stars IS NOT excluded.stars
              OR updated_at IS NOT excluded.updated_at
            THEN excluded.last_crawled_at
            ELSE last_changed_at
        END,
        name = excluded.name,
        owner = excluded.owner,
        stars = excluded.stars,
        updated_at = excluded.updated_at,
        last_crawled_at = excluded.last_crawled_at
";

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, target_count, persisted, status";

/// SQLite storage backend
pub struct SqliteRepository {
    conn: Connection,
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        target_count: row.get::<_, i64>(4)? as u64,
        persisted: row.get::<_, i64>(5)? as u64,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl SqliteRepository {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    pub fn create_run(&mut self, config_hash: &str, target_count: u64) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, target_count, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                now_string(),
                config_hash,
                target_count as i64,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Closes a run with its final status and persisted count
    pub fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        persisted: u64,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, persisted = ?3 WHERE id = ?4",
            params![status.to_db_string(), now_string(), persisted as i64, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    pub fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?)
    }

    // ===== Abandoned Ranges =====

    pub fn record_abandoned_range(
        &mut self,
        run_id: i64,
        range: KeyRange,
        reason: &str,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO abandoned_ranges (run_id, low, high, reason, abandoned_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                range.low() as i64,
                range.high() as i64,
                reason,
                now_string()
            ],
        )?;
        Ok(())
    }

    pub fn abandoned_ranges(&self, run_id: i64) -> StorageResult<Vec<AbandonedRangeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, low, high, reason FROM abandoned_ranges WHERE run_id = ?1 ORDER BY low",
        )?;

        let ranges = stmt
            .query_map(params![run_id], |row| {
                Ok(AbandonedRangeRecord {
                    run_id: row.get(0)?,
                    low: row.get::<_, i64>(1)? as u64,
                    high: row.get::<_, i64>(2)? as u64,
                    reason: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ranges)
    }

    // ===== Repositories =====

    pub fn get_repository(&self, id: &str) -> StorageResult<Option<StoredRepository>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, owner, stars, updated_at, first_seen_at, last_changed_at, last_crawled_at
                 FROM repositories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(StoredRepository {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        owner: row.get(2)?,
                        stars: row.get::<_, i64>(3)? as u64,
                        updated_at: row.get(4)?,
                        first_seen_at: row.get(5)?,
                        last_changed_at: row.get(6)?,
                        last_crawled_at: row.get(7)?,
                    })
                },
            )
            .optional()?)
    }

    // ===== Statistics =====

    pub fn count_repositories(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_abandoned_ranges(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM abandoned_ranges", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// The `limit` most-starred repositories as `(owner/name, stars)`
    pub fn top_repositories(&self, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT owner, name, stars FROM repositories ORDER BY stars DESC, id LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let owner: String = row.get(0)?;
                let name: String = row.get(1)?;
                let stars: i64 = row.get(2)?;
                Ok((format!("{}/{}", owner, name), stars as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

impl Repository for SqliteRepository {
    fn bulk_upsert(&mut self, entities: &[RepoEntity]) -> StorageResult<usize> {
        if entities.is_empty() {
            return Ok(0);
        }

        let crawled_at = now_string();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for entity in entities {
                stmt.execute(params![
                    entity.id,
                    entity.name,
                    entity.owner,
                    entity.stars as i64,
                    entity.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    crawled_at,
                ])?;
            }
        }
        tx.commit()?;

        Ok(entities.len())
    }
}
