use crate::config::types::{Bootstrap, Config};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable holding the GitHub API token
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Environment variable holding the database location
pub const DATABASE_ENV: &str = "DATABASE_URL";

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use star_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Target: {}", config.crawler.target_count);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded with every run so runs with different settings can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
///
/// Without a path the defaults are used and the hash covers the empty document.
pub fn load_config_with_hash(path: Option<&Path>) -> Result<(Config, String), ConfigError> {
    match path {
        Some(path) => {
            let config = load_config(path)?;
            let hash = compute_config_hash(path)?;
            Ok((config, hash))
        }
        None => Ok((parse_config("")?, hash_content(""))),
    }
}

/// Resolves the database location alone, for commands that never call the API
pub fn resolve_database_path<F>(config: &Config, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    config
        .output
        .database_path
        .clone()
        .or_else(|| lookup(DATABASE_ENV))
        .map(|p| strip_sqlite_scheme(&p).to_string())
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| {
            ConfigError::Missing(format!(
                "database location ([output] database-path or ${})",
                DATABASE_ENV
            ))
        })
}

/// Resolves the API token and database location
///
/// Config values win; `lookup` supplies environment fallbacks. Missing either
/// setting is fatal.
pub fn resolve_bootstrap<F>(config: &Config, lookup: F) -> Result<Bootstrap, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let token = config
        .api
        .token
        .clone()
        .or_else(|| lookup(TOKEN_ENV))
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            ConfigError::Missing(format!("API token ([api] token or ${})", TOKEN_ENV))
        })?;

    let database_path = resolve_database_path(config, &lookup)?;

    Ok(Bootstrap {
        token,
        database_path,
    })
}

fn strip_sqlite_scheme(location: &str) -> &str {
    location
        .strip_prefix("sqlite://")
        .or_else(|| location.strip_prefix("sqlite:"))
        .unwrap_or(location)
}
