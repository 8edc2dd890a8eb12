//! Configuration module for Star-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving the API token and database location from the environment.
//!
//! # Example
//!
//! ```no_run
//! use star_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawling {} ranges at a time", config.crawler.concurrency_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Bootstrap, Config, CrawlerConfig, OutputConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, resolve_bootstrap,
    resolve_database_path, DATABASE_ENV, TOKEN_ENV,
};

pub use validation::validate;
