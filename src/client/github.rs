//! GitHub GraphQL search client
//!
//! This module handles all HTTP requests to the search API, including:
//! - Building the HTTP client with auth, user agent and timeouts
//! - Running the repository search query for one predicate and cursor
//! - Classifying each response (page, quota exhausted, secondary limit, transient, rejected)
//! - Retrying transient faults with backoff and page-size degradation

use crate::client::{Page, RawRecord, SearchClient, SearchError};
use crate::config::ApiConfig;
use crate::crawler::retry::{BackoffPolicy, FetchRetry, FetchStep};
use crate::HarvestError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::time::Duration;

const SEARCH_QUERY: &str = r#"
query ($q: String!, $first: Int!, $after: String) {
  search(query: $q, type: REPOSITORY, first: $first, after: $after) {
    repositoryCount
    pageInfo {
      endCursor
      hasNextPage
    }
    nodes {
      ... on Repository {
        id
        name
        owner {
          login
        }
        stargazerCount
        updatedAt
      }
    }
  }
  rateLimit {
    cost
    remaining
    resetAt
  }
}
"#;

const VIEWER_QUERY: &str = "query { viewer { login } }";

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    search: Option<SearchConnection>,
    rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchConnection {
    repository_count: u64,
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<RawRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitInfo {
    remaining: u64,
    reset_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    login: String,
}

/// Classified result of a single HTTP attempt
#[derive(Debug)]
enum Attempt {
    Page(Page),
    Quota(DateTime<Utc>),
    Secondary(Option<Duration>),
    Transient(String),
    Rejected(u16, String),
}

/// Builds an HTTP client with proper configuration
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// GitHub GraphQL implementation of [`SearchClient`]
pub struct GitHubClient {
    http: Client,
    endpoint: String,
    token: String,
    policy: BackoffPolicy,
    quota_threshold: u64,
    jitter_keys: RandomState,
}

impl GitHubClient {
    pub fn new(config: &ApiConfig, token: &str) -> Result<Self, HarvestError> {
        Ok(Self {
            http: build_http_client(config)?,
            endpoint: config.endpoint.clone(),
            token: token.to_string(),
            policy: BackoffPolicy::from_api_config(config),
            quota_threshold: config.quota_threshold,
            jitter_keys: RandomState::new(),
        })
    }

    /// Checks the token once before crawling and returns the authenticated login
    pub async fn validate_token(&self) -> Result<String, HarvestError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "query": VIEWER_QUERY }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(HarvestError::Auth(
                "the API rejected the token (HTTP 401)".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(HarvestError::Auth(format!(
                "token check failed with HTTP {}",
                status.as_u16()
            )));
        }

        let body: GraphQlResponse<ViewerData> = response.json().await?;
        match body.data {
            Some(data) => Ok(data.viewer.login),
            None => Err(HarvestError::Auth(join_messages(&body.errors))),
        }
    }

    async fn attempt(&self, cursor: Option<&str>, predicate: &str, page_size: u32) -> Attempt {
        let body = json!({
            "query": SEARCH_QUERY,
            "variables": { "q": predicate, "first": page_size, "after": cursor },
        });

        let response = match self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Transient("request timeout".to_string()),
            Err(e) => return Attempt::Transient(format!("network error: {}", e)),
        };

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return classify_throttle(response.headers(), self.policy.secondary_fallback);
        }
        if status.is_server_error() {
            return Attempt::Transient(format!("HTTP {}", status.as_u16()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Attempt::Rejected(status.as_u16(), message);
        }

        match response.json::<GraphQlResponse<SearchData>>().await {
            Ok(parsed) => interpret(parsed, self.quota_threshold, self.policy.secondary_fallback),
            Err(e) => Attempt::Transient(format!("undecodable response: {}", e)),
        }
    }
}

#[async_trait]
impl SearchClient for GitHubClient {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        predicate: &str,
        page_size: u32,
    ) -> Result<Page, SearchError> {
        let seed = self.jitter_keys.hash_one((predicate, cursor));
        let mut retry = FetchRetry::new(self.policy.clone(), page_size, seed);

        loop {
            let attempt = retry.begin_attempt();
            let (step, message) = match self.attempt(cursor, predicate, retry.page_size()).await {
                Attempt::Page(page) => return Ok(page),
                Attempt::Quota(reset_at) => return Err(SearchError::QuotaExceeded { reset_at }),
                Attempt::Rejected(status, message) => {
                    return Err(SearchError::Rejected { status, message })
                }
                Attempt::Secondary(retry_after) => (
                    retry.on_secondary_limit(retry_after),
                    "secondary rate limit".to_string(),
                ),
                Attempt::Transient(message) => (retry.on_transient(), message),
            };

            match step {
                FetchStep::Retry { delay } => {
                    tracing::warn!(
                        "[{}] attempt {} failed ({}), retrying in {:?} with page size {}",
                        predicate,
                        attempt,
                        message,
                        delay,
                        retry.page_size()
                    );
                    tokio::time::sleep(delay).await;
                }
                FetchStep::GiveUp => {
                    return Err(SearchError::Transient {
                        attempts: retry.attempts(),
                        message,
                    })
                }
            }
        }
    }
}

/// Splits a 403/429 into primary quota exhaustion and a secondary "slow down"
fn classify_throttle(headers: &HeaderMap, fallback: Duration) -> Attempt {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    if header("x-ratelimit-remaining").as_deref() == Some("0") {
        let reset_at = header("x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| Utc::now() + to_chrono(fallback));
        return Attempt::Quota(reset_at);
    }

    let retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    Attempt::Secondary(retry_after)
}

/// Turns a decoded 200 response into an attempt outcome
fn interpret(
    response: GraphQlResponse<SearchData>,
    quota_threshold: u64,
    fallback: Duration,
) -> Attempt {
    let GraphQlResponse { data, errors } = response;

    let rate_limited = errors
        .iter()
        .any(|e| e.kind.as_deref() == Some("RATE_LIMITED"));

    let data = match data {
        Some(data) => data,
        None if rate_limited => return Attempt::Quota(Utc::now() + to_chrono(fallback)),
        None => return Attempt::Transient(join_messages(&errors)),
    };

    if let Some(rate_limit) = &data.rate_limit {
        if rate_limit.remaining < quota_threshold {
            return Attempt::Quota(rate_limit.reset_at);
        }
    }

    let search = match data.search {
        Some(search) => search,
        None if rate_limited => return Attempt::Quota(Utc::now() + to_chrono(fallback)),
        None => return Attempt::Transient(join_messages(&errors)),
    };

    if !errors.is_empty() {
        tracing::warn!(
            "Partial GraphQL errors alongside usable data: {}",
            join_messages(&errors)
        );
    }

    Attempt::Page(Page {
        records: search
            .nodes
            .into_iter()
            .flatten()
            .filter(|record| !record.is_empty())
            .collect(),
        next_cursor: search.page_info.end_cursor,
        has_more: search.page_info.has_next_page,
        total_match_count: search.repository_count,
    })
}

fn join_messages(errors: &[GraphQlError]) -> String {
    if errors.is_empty() {
        return "response carried no data".to_string();
    }
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}
