//! Search API client
//!
//! The crawl engine only sees the [`SearchClient`] trait: one call fetches one
//! page for a predicate and cursor, and fails with a tagged [`SearchError`].
//! The GitHub GraphQL implementation lives in [`github`].

pub mod github;

pub use github::GitHubClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Failure of a page fetch, after the client's own retries
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    /// The shared primary quota fell below the safety threshold
    #[error("primary rate limit exhausted, resets at {reset_at}")]
    QuotaExceeded { reset_at: DateTime<Utc> },

    /// Retry budget spent on server errors, network failures, or throttling
    #[error("transient failure after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    /// The API refused the request outright; retrying the same call won't help
    #[error("request rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Repository owner as returned by the search API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawOwner {
    pub login: Option<String>,
}

/// One search hit, as loosely typed as the API delivers it
///
/// Every field is optional; the translator decides what is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub owner: Option<RawOwner>,
    pub stargazer_count: Option<u64>,
    pub updated_at: Option<String>,
}

impl RawRecord {
    /// True for hits that matched no selected fragment (non-repository nodes)
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_none()
            && self.owner.is_none()
            && self.stargazer_count.is_none()
            && self.updated_at.is_none()
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// Cursor for the next page; only meaningful within the same predicate
    pub next_cursor: Option<String>,
    pub has_more: bool,
    /// Total matches for the predicate; only the first page's value is used
    pub total_match_count: u64,
}

/// Executes one paginated search request
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Fetches the page after `cursor` (`None` for the first page) matching
    /// `predicate`, asking for about `page_size` records
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        predicate: &str,
        page_size: u32,
    ) -> Result<Page, SearchError>;
}
