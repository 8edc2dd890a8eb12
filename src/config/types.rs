use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Star-Harvest
///
/// Every section is optional; omitted keys fall back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub api: ApiConfig,
    pub output: OutputConfig,
}

/// Crawl orchestration configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of repositories to persist before stopping
    #[serde(rename = "target-count")]
    pub target_count: u64,

    /// Number of star ranges crawled simultaneously
    #[serde(rename = "concurrency-limit")]
    pub concurrency_limit: u32,

    /// Lower bound of the initial star range (inclusive)
    #[serde(rename = "min-key")]
    pub min_key: u64,

    /// Upper bound of the initial star range (inclusive)
    #[serde(rename = "max-key")]
    pub max_key: u64,

    /// Hard cap on the number of results a single search query can return
    #[serde(rename = "result-cap")]
    pub result_cap: u64,

    /// Politeness delay between consecutive pages of one range (milliseconds)
    #[serde(rename = "inter-request-delay-ms")]
    pub inter_request_delay_ms: u64,

    /// Consecutive failed fetches after which a range is abandoned
    #[serde(rename = "max-consecutive-errors")]
    pub max_consecutive_errors: u32,

    /// Range-level backoff unit; the n-th consecutive error sleeps n times this
    #[serde(rename = "range-retry-base-secs")]
    pub range_retry_base_secs: u64,

    /// Added to the quota reset time before crawling resumes
    #[serde(rename = "rate-limit-buffer-secs")]
    pub rate_limit_buffer_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            target_count: 100_000,
            concurrency_limit: 3,
            min_key: 1,
            max_key: 1_000_000,
            result_cap: 1_000,
            inter_request_delay_ms: 1_000,
            max_consecutive_errors: 5,
            range_retry_base_secs: 10,
            rate_limit_buffer_secs: 5,
        }
    }
}

impl CrawlerConfig {
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    pub fn range_retry_base(&self) -> Duration {
        Duration::from_secs(self.range_retry_base_secs)
    }

    pub fn rate_limit_buffer(&self) -> Duration {
        Duration::from_secs(self.rate_limit_buffer_secs)
    }
}

/// GitHub GraphQL API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,

    /// API token; falls back to `$GITHUB_TOKEN` when absent
    pub token: Option<String>,

    /// Requested page size (GitHub allows at most 100)
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Floor for page-size degradation after transient failures
    #[serde(rename = "min-page-size")]
    pub min_page_size: u32,

    /// Attempts per page fetch before giving up with a transient failure
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// First exponential backoff delay (milliseconds)
    #[serde(rename = "retry-base-delay-ms")]
    pub retry_base_delay_ms: u64,

    /// Cap on the exponential part of the backoff (milliseconds)
    #[serde(rename = "retry-max-delay-ms")]
    pub retry_max_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff (milliseconds)
    #[serde(rename = "retry-jitter-ms")]
    pub retry_jitter_ms: u64,

    /// Wait used when a secondary rate limit response carries no Retry-After
    #[serde(rename = "secondary-limit-fallback-secs")]
    pub secondary_limit_fallback_secs: u64,

    /// Remaining-quota level below which the primary limit counts as exhausted
    #[serde(rename = "quota-threshold")]
    pub quota_threshold: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.github.com/graphql".to_string(),
            token: None,
            page_size: 100,
            min_page_size: 10,
            max_retries: 5,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            retry_jitter_ms: 500,
            secondary_limit_fallback_secs: 60,
            quota_threshold: 10,
            request_timeout_secs: 30,
            user_agent: format!("star-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file; falls back to `$DATABASE_URL`
    #[serde(rename = "database-path")]
    pub database_path: Option<String>,
}

/// Credentials and storage location resolved from config and environment
///
/// Both are required before any crawling starts.
#[derive(Clone)]
pub struct Bootstrap {
    pub token: String,
    pub database_path: String,
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("token", &"<redacted>")
            .field("database_path", &self.database_path)
            .finish()
    }
}
