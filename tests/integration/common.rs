//! Shared fixtures for the integration tests

use serde_json::{json, Value};
use star_harvest::config::ApiConfig;
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

/// API settings pointed at the mock server, with near-zero backoff
pub fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        endpoint: format!("{}/graphql", server.uri()),
        max_retries: 3,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 5,
        retry_jitter_ms: 0,
        secondary_limit_fallback_secs: 0,
        request_timeout_secs: 5,
        ..ApiConfig::default()
    }
}

pub fn node(id: &str, stars: u64) -> Value {
    json!({
        "id": id,
        "name": format!("repo-{}", id),
        "owner": { "login": "octo" },
        "stargazerCount": stars,
        "updatedAt": "2024-03-01T10:00:00Z"
    })
}

/// A successful search response
pub fn search_body(nodes: Vec<Value>, end_cursor: Option<&str>, total: u64) -> Value {
    search_body_with_quota(nodes, end_cursor, total, 4_999)
}

pub fn search_body_with_quota(
    nodes: Vec<Value>,
    end_cursor: Option<&str>,
    total: u64,
    remaining: u64,
) -> Value {
    json!({
        "data": {
            "search": {
                "repositoryCount": total,
                "pageInfo": {
                    "endCursor": end_cursor,
                    "hasNextPage": end_cursor.is_some()
                },
                "nodes": nodes
            },
            "rateLimit": {
                "cost": 1,
                "remaining": remaining,
                "resetAt": "2030-01-01T00:00:00Z"
            }
        }
    })
}

/// Decoded JSON bodies of every request the server saw
pub async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}
