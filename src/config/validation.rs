use crate::config::types::{ApiConfig, Config, CrawlerConfig};
use crate::ConfigError;
use url::Url;

/// GitHub refuses search pages larger than this
const MAX_PAGE_SIZE: u32 = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency_limit < 1 || config.concurrency_limit > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency_limit must be between 1 and 64, got {}",
            config.concurrency_limit
        )));
    }

    if config.min_key > config.max_key {
        return Err(ConfigError::Validation(format!(
            "min_key ({}) must not exceed max_key ({})",
            config.min_key, config.max_key
        )));
    }

    if config.result_cap < 1 {
        return Err(ConfigError::Validation(
            "result_cap must be >= 1".to_string(),
        ));
    }

    if config.max_consecutive_errors < 1 {
        return Err(ConfigError::Validation(format!(
            "max_consecutive_errors must be >= 1, got {}",
            config.max_consecutive_errors
        )));
    }

    Ok(())
}

/// Validates API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;

    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "endpoint must use http or https, got '{}'",
            endpoint.scheme()
        )));
    }

    if config.min_page_size < 1 {
        return Err(ConfigError::Validation(
            "min_page_size must be >= 1".to_string(),
        ));
    }

    if config.page_size < config.min_page_size || config.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page_size must be between min_page_size ({}) and {}, got {}",
            config.min_page_size, MAX_PAGE_SIZE, config.page_size
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.retry_base_delay_ms > config.retry_max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry_base_delay_ms ({}) must not exceed retry_max_delay_ms ({})",
            config.retry_base_delay_ms, config.retry_max_delay_ms
        )));
    }

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}
