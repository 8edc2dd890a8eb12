//! Star-Harvest: an exhaustive GitHub repository harvester
//!
//! This crate enumerates repositories from the GitHub GraphQL search API, which
//! caps every query at 1,000 results. It gets around the cap by splitting the
//! star-count key space into disjoint ranges and crawling each range to
//! exhaustion, sharing one rate-limit budget across concurrent range workers.

pub mod client;
pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod storage;
pub mod translate;

use thiserror::Error;

/// Main error type for Star-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Search API error: {0}")]
    Search(#[from] client::SearchError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing required setting: {0}")]
    Missing(String),
}

/// Result type alias for Star-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport, KeyRange};
pub use model::RepoEntity;
