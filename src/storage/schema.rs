//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Star-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested repositories, keyed by GraphQL node ID
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    owner TEXT NOT NULL,
    stars INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_changed_at TEXT NOT NULL,
    last_crawled_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_repositories_stars ON repositories(stars);
CREATE INDEX IF NOT EXISTS idx_repositories_owner ON repositories(owner);

-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    target_count INTEGER NOT NULL,
    persisted INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
);

-- Star ranges given up after repeated failures (incomplete coverage)
CREATE TABLE IF NOT EXISTS abandoned_ranges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    low INTEGER NOT NULL,
    high INTEGER NOT NULL,
    reason TEXT NOT NULL,
    abandoned_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_abandoned_ranges_run ON abandoned_ranges(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
