//! GitHub client retry contract against a mock GraphQL endpoint

use crate::common::{api_config, node, request_bodies, search_body, search_body_with_quota, TOKEN};
use chrono::{TimeZone, Utc};
use serde_json::json;
use star_harvest::client::{GitHubClient, SearchClient, SearchError};
use star_harvest::HarvestError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_page_parses_search_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(
            vec![node("R_1", 12), json!({}), node("R_2", 11)],
            Some("c2"),
            2_345,
        )))
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    let page = client
        .fetch_page(Some("c1"), "stars:10..20", 100)
        .await
        .unwrap();

    // Non-repository hits come back as empty objects and are dropped
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].id.as_deref(), Some("R_1"));
    assert_eq!(page.next_cursor.as_deref(), Some("c2"));
    assert!(page.has_more);
    assert_eq!(page.total_match_count, 2_345);

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["variables"]["q"], "stars:10..20");
    assert_eq!(bodies[0]["variables"]["after"], "c1");
    assert_eq!(bodies[0]["variables"]["first"], 100);
}

#[tokio::test]
async fn test_server_error_halves_page_size_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(
            vec![node("R_1", 5)],
            None,
            1,
        )))
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    let page = client.fetch_page(None, "stars:1..9", 100).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert!(!page.has_more);

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["variables"]["first"], 100);
    assert_eq!(bodies[1]["variables"]["first"], 50);
    assert_eq!(bodies[1]["variables"]["after"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_retry_budget_exhausted_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    let err = client.fetch_page(None, "stars:1..9", 100).await.unwrap_err();

    assert!(matches!(err, SearchError::Transient { attempts: 3, .. }));
}

#[tokio::test]
async fn test_page_size_never_drops_below_floor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = api_config(&server);
    config.max_retries = 5;
    config.min_page_size = 20;
    let client = GitHubClient::new(&config, TOKEN).unwrap();
    let _ = client.fetch_page(None, "stars:1..9", 100).await;

    let sizes: Vec<_> = request_bodies(&server)
        .await
        .iter()
        .map(|b| b["variables"]["first"].as_u64().unwrap())
        .collect();
    assert_eq!(sizes, vec![100, 50, 25, 20, 20]);
}

#[tokio::test]
async fn test_exhausted_primary_quota_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1700000000"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    let err = client.fetch_page(None, "stars:1..9", 100).await.unwrap_err();

    assert_eq!(
        err,
        SearchError::QuotaExceeded {
            reset_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap()
        }
    );
}

#[tokio::test]
async fn test_low_remaining_quota_discards_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body_with_quota(
            vec![node("R_1", 5)],
            Some("c1"),
            10,
            3,
        )))
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    let err = client.fetch_page(None, "stars:1..9", 100).await.unwrap_err();

    assert_eq!(
        err,
        SearchError::QuotaExceeded {
            reset_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
        }
    );
}

#[tokio::test]
async fn test_secondary_limit_waits_and_keeps_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(vec![], None, 0)))
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    let page = client.fetch_page(None, "stars:1..9", 80).await.unwrap();
    assert!(page.records.is_empty());

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[1]["variables"]["first"], 80);
}

#[tokio::test]
async fn test_graphql_errors_without_data_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "errors": [{ "message": "Something went wrong" }] })),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    let err = client.fetch_page(None, "stars:1..9", 100).await.unwrap_err();

    match err {
        SearchError::Transient { attempts, message } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("Something went wrong"));
        }
        other => panic!("expected transient failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limited_graphql_error_is_quota() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "type": "RATE_LIMITED", "message": "API rate limit exceeded" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    let err = client.fetch_page(None, "stars:1..9", 100).await.unwrap_err();

    assert!(matches!(err, SearchError::QuotaExceeded { .. }));
}

#[tokio::test]
async fn test_client_error_is_rejected_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad query"))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    let err = client.fetch_page(None, "stars:1..9", 100).await.unwrap_err();

    assert_eq!(
        err,
        SearchError::Rejected {
            status: 422,
            message: "bad query".to_string()
        }
    );
}

#[tokio::test]
async fn test_validate_token_returns_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "query": "query { viewer { login } }" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "viewer": { "login": "octocat" } } })),
        )
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    assert_eq!(client.validate_token().await.unwrap(), "octocat");
}

#[tokio::test]
async fn test_validate_token_rejects_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = GitHubClient::new(&api_config(&server), TOKEN).unwrap();
    assert!(matches!(
        client.validate_token().await,
        Err(HarvestError::Auth(_))
    ));
}
