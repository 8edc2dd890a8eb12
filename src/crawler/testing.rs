//! Scripted collaborators for crawl engine tests

use crate::client::{Page, RawOwner, RawRecord, SearchClient, SearchError};
use crate::crawler::coordinator::CrawlSettings;
use crate::crawler::frontier::KeyRange;
use crate::model::RepoEntity;
use crate::storage::{Repository, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type Fallback = Box<dyn Fn(&str, Option<&str>) -> Page + Send + Sync>;

/// One recorded `fetch_page` call
#[derive(Debug, Clone)]
pub struct Call {
    pub predicate: String,
    pub cursor: Option<String>,
    pub at: Instant,
}

/// Replays canned responses per predicate; unscripted calls get the fallback
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Result<Page, SearchError>>>>,
    calls: Mutex<Vec<Call>>,
    latency: Mutex<HashMap<String, Duration>>,
    fallback: Option<Fallback>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: Mutex::new(HashMap::new()),
            fallback: None,
        }
    }

    pub fn with_fallback(
        fallback: impl Fn(&str, Option<&str>) -> Page + Send + Sync + 'static,
    ) -> Self {
        Self {
            fallback: Some(Box::new(fallback)),
            ..Self::new()
        }
    }

    pub fn script(&self, range: KeyRange, responses: Vec<Result<Page, SearchError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(range.predicate("stars"), responses.into());
    }

    /// Delays every response for `range`
    pub fn delay(&self, range: KeyRange, latency: Duration) {
        self.latency
            .lock()
            .unwrap()
            .insert(range.predicate("stars"), latency);
    }

    pub fn transient() -> SearchError {
        SearchError::Transient {
            attempts: 5,
            message: "HTTP 502".to_string(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, range: KeyRange) -> usize {
        let predicate = range.predicate("stars");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.predicate == predicate)
            .count()
    }
}

#[async_trait]
impl SearchClient for ScriptedClient {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        predicate: &str,
        _page_size: u32,
    ) -> Result<Page, SearchError> {
        self.calls.lock().unwrap().push(Call {
            predicate: predicate.to_string(),
            cursor: cursor.map(str::to_string),
            at: Instant::now(),
        });

        // Let other workers interleave like they would around real I/O
        let latency = self.latency.lock().unwrap().get(predicate).copied();
        match latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(predicate)
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(response) => response,
            None => Ok(self
                .fallback
                .as_ref()
                .map(|f| f(predicate, cursor))
                .unwrap_or_default()),
        }
    }
}

/// In-memory repository; can be told to fail its next N upserts or to write slowly
#[derive(Debug, Default)]
pub struct MemoryRepository {
    rows: HashMap<String, RepoEntity>,
    failures_left: usize,
    write_delay: Duration,
}

impl MemoryRepository {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: times,
            ..Self::default()
        }
    }

    /// Blocks the calling thread for `write_delay` on every upsert
    pub fn slow(write_delay: Duration) -> Self {
        Self {
            write_delay,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }
}

impl Repository for MemoryRepository {
    fn bulk_upsert(&mut self, entities: &[RepoEntity]) -> StorageResult<usize> {
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        for entity in entities {
            self.rows.insert(entity.id.clone(), entity.clone());
        }
        Ok(entities.len())
    }
}

pub fn record(id: &str) -> RawRecord {
    RawRecord {
        id: Some(id.to_string()),
        name: Some(format!("repo-{}", id)),
        owner: Some(RawOwner {
            login: Some("octo".to_string()),
        }),
        stargazer_count: Some(42),
        updated_at: Some("2024-05-01T12:00:00Z".to_string()),
    }
}

pub fn settings(initial_range: KeyRange) -> CrawlSettings {
    CrawlSettings {
        key_field: "stars".to_string(),
        initial_range,
        result_cap: 1_000,
        concurrency_limit: 3,
        page_size: 100,
        inter_request_delay: Duration::from_secs(1),
        max_consecutive_errors: 5,
        range_retry_base: Duration::from_secs(10),
        rate_limit_buffer: Duration::from_secs(5),
    }
}
