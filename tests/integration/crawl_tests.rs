//! End-to-end crawls against a mock GraphQL endpoint
//!
//! These tests run the real GitHub client, the crawl engine, and the SQLite
//! repository together, with the API replaced by wiremock.

use crate::common::{api_config, node, search_body, TOKEN};
use serde_json::{json, Value};
use star_harvest::client::GitHubClient;
use star_harvest::config::Config;
use star_harvest::crawler::crawl;
use star_harvest::storage::{RunStatus, SharedRepository, SqliteRepository};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `stars:1..10` with no politeness delay
fn create_test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api = api_config(server);
    config.crawler.min_key = 1;
    config.crawler.max_key = 10;
    config.crawler.concurrency_limit = 2;
    config.crawler.inter_request_delay_ms = 0;
    config.crawler.range_retry_base_secs = 0;
    config.crawler.max_consecutive_errors = 2;
    config
}

async fn mount_page(server: &MockServer, predicate: &str, after: Option<&str>, body: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(
            json!({ "variables": { "q": predicate, "after": after } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// `stars:1..10` is over the cap and splits; `1..5` has two pages, `6..10` one
async fn mount_split_scenario(server: &MockServer) {
    mount_page(
        server,
        "stars:1..10",
        None,
        search_body(vec![node("R_0", 10)], Some("x1"), 1_500),
    )
    .await;
    mount_page(
        server,
        "stars:1..5",
        None,
        search_body(vec![node("R_1", 5), node("R_2", 4)], Some("c1"), 3),
    )
    .await;
    mount_page(
        server,
        "stars:1..5",
        Some("c1"),
        search_body(vec![node("R_3", 1)], None, 3),
    )
    .await;
}

fn open_repository(dir: &TempDir) -> Arc<Mutex<SqliteRepository>> {
    let db_path = dir.path().join("harvest.db");
    Arc::new(Mutex::new(SqliteRepository::new(&db_path).unwrap()))
}

#[tokio::test]
async fn test_full_crawl_splits_and_persists() {
    let server = MockServer::start().await;
    mount_split_scenario(&server).await;
    mount_page(
        &server,
        "stars:6..10",
        None,
        search_body(vec![node("R_6", 9), node("R_7", 8)], None, 2),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let storage = open_repository(&dir);
    let repository: SharedRepository = storage.clone();
    let config = create_test_config(&server);
    let client = Arc::new(GitHubClient::new(&config.api, TOKEN).unwrap());

    let report = crawl(&config, client, repository, 100).await.unwrap();

    assert_eq!(report.splits, 1);
    assert_eq!(report.persisted, 5);
    assert!(report.abandoned.is_empty());
    assert!(!report.target_reached());

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_repositories().unwrap(), 5);
    // The over-cap page of the parent range is never persisted
    assert!(storage.get_repository("R_0").unwrap().is_none());
    assert_eq!(storage.get_repository("R_6").unwrap().unwrap().stars, 9);
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    mount_split_scenario(&server).await;
    mount_page(
        &server,
        "stars:6..10",
        None,
        search_body(vec![node("R_6", 9)], None, 1),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let storage = open_repository(&dir);
    let config = create_test_config(&server);

    for _ in 0..2 {
        let client = Arc::new(GitHubClient::new(&config.api, TOKEN).unwrap());
        let repository: SharedRepository = storage.clone();
        crawl(&config, client, repository, 100).await.unwrap();
    }

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_repositories().unwrap(), 4);
    let row = storage.get_repository("R_1").unwrap().unwrap();
    assert_eq!(row.first_seen_at, row.last_changed_at);
    assert_ne!(row.last_changed_at, row.last_crawled_at);
}

#[tokio::test]
async fn test_failing_range_is_abandoned_and_recorded() {
    let server = MockServer::start().await;
    mount_split_scenario(&server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "variables": { "q": "stars:6..10" } })))
        .respond_with(ResponseTemplate::new(422).set_body_string("unprocessable"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let storage = open_repository(&dir);
    let run_id = storage.lock().unwrap().create_run("hash", 100).unwrap();
    let repository: SharedRepository = storage.clone();
    let config = create_test_config(&server);
    let client = Arc::new(GitHubClient::new(&config.api, TOKEN).unwrap());

    let report = crawl(&config, client, repository, 100).await.unwrap();

    assert_eq!(report.persisted, 3);
    assert_eq!(report.abandoned.len(), 1);
    let (range, reason) = &report.abandoned[0];
    assert_eq!((range.low(), range.high()), (6, 10));
    assert!(reason.contains("422"));

    let mut storage = storage.lock().unwrap();
    for (range, reason) in &report.abandoned {
        storage.record_abandoned_range(run_id, *range, reason).unwrap();
    }
    storage
        .finish_run(run_id, report.run_status(), report.persisted)
        .unwrap();

    let ranges = storage.abandoned_ranges(run_id).unwrap();
    assert_eq!(ranges.len(), 1);
    assert_eq!((ranges[0].low, ranges[0].high), (6, 10));
    let run = storage.get_run(run_id).unwrap();
    assert_eq!(run.persisted, 3);
    assert_eq!(run.status, RunStatus::Partial);
}

#[tokio::test]
async fn test_target_stops_crawl_early() {
    let server = MockServer::start().await;
    mount_split_scenario(&server).await;
    mount_page(
        &server,
        "stars:6..10",
        None,
        search_body(vec![node("R_6", 9), node("R_7", 8)], None, 2),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let storage = open_repository(&dir);
    let repository: SharedRepository = storage.clone();
    let config = create_test_config(&server);
    let client = Arc::new(GitHubClient::new(&config.api, TOKEN).unwrap());

    let report = crawl(&config, client, repository, 2).await.unwrap();

    assert_eq!(report.persisted, 2);
    assert!(report.target_reached());
    assert_eq!(storage.lock().unwrap().count_repositories().unwrap(), 2);
}
