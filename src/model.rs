//! Domain entity produced by the crawl

use chrono::{DateTime, Utc};

/// A GitHub repository as stored by the harvester
///
/// `id` is the GraphQL node ID, which is stable across renames and transfers,
/// so it is the upsert key. `name`, `owner`, `stars` and `updated_at` are the
/// mutable fields compared on re-crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntity {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub stars: u64,
    pub updated_at: DateTime<Utc>,
}
