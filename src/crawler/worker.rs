//! Range worker - pagination state machine for a single key range
//!
//! A worker owns one [`KeyRange`] and pages through it sequentially until the
//! range is drained, split, rate limited, or abandoned. Workers only meet
//! through the shared [`Frontier`] and [`Progress`], whose locks are never held
//! across a fetch or a sleep.

use crate::client::{SearchClient, SearchError};
use crate::crawler::coordinator::CrawlSettings;
use crate::crawler::frontier::{Frontier, KeyRange};
use crate::crawler::progress::{Progress, Reservation};
use crate::crawler::retry::{RangeRetry, RangeStep};
use crate::model::RepoEntity;
use crate::storage::{SharedRepository, StorageResult};
use crate::translate::translate_batch;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

/// How often a worker re-checks a budget held by other workers' reservations
const BUDGET_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// State shared by every worker of one crawl
pub struct CrawlShared {
    pub client: Arc<dyn SearchClient>,
    pub repository: SharedRepository,
    pub frontier: Frontier,
    pub progress: Arc<Progress>,
    pub settings: CrawlSettings,
}

/// How a worker finished with its range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeOutcome {
    /// The range was replaced by two halves, already queued at the front
    Split { lower: KeyRange, upper: KeyRange },
    /// No more pages, or the target was reached
    Drained,
    /// Primary quota exhausted; the untouched range was queued again
    RateLimited { reset_at: DateTime<Utc> },
    /// Too many consecutive failures; the range is dropped
    Abandoned { reason: String },
}

/// Summary returned by [`RangeWorker::run`]
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub range: KeyRange,
    pub outcome: RangeOutcome,
    pub pages_fetched: u64,
    pub persisted: u64,
}

/// Crawls one key range
pub struct RangeWorker {
    range: KeyRange,
    shared: Arc<CrawlShared>,
    retry: RangeRetry,
    pages_fetched: u64,
    persisted: u64,
}

impl RangeWorker {
    pub fn new(range: KeyRange, shared: Arc<CrawlShared>) -> Self {
        let retry = RangeRetry::new(
            shared.settings.max_consecutive_errors,
            shared.settings.range_retry_base,
        );
        Self {
            range,
            shared,
            retry,
            pages_fetched: 0,
            persisted: 0,
        }
    }

    /// Runs the pagination loop to a terminal state
    pub async fn run(mut self) -> WorkerReport {
        let outcome = self.crawl_range().await;
        WorkerReport {
            range: self.range,
            outcome,
            pages_fetched: self.pages_fetched,
            persisted: self.persisted,
        }
    }

    async fn crawl_range(&mut self) -> RangeOutcome {
        let shared = Arc::clone(&self.shared);
        let settings = &shared.settings;
        let predicate = self.range.predicate(&settings.key_field);
        let mut cursor: Option<String> = None;

        tracing::debug!("Starting range {}", self.range);

        loop {
            if shared.progress.is_complete() {
                return RangeOutcome::Drained;
            }

            let fetched = shared
                .client
                .fetch_page(cursor.as_deref(), &predicate, settings.page_size)
                .await;

            let page = match fetched {
                Ok(page) => page,
                Err(SearchError::QuotaExceeded { reset_at }) => {
                    // Pagination restarts from the first page when the range comes back
                    shared.frontier.push_front(self.range);
                    tracing::warn!(
                        "Rate limit reached in range {}, re-queued (resets at {})",
                        self.range,
                        reset_at
                    );
                    return RangeOutcome::RateLimited { reset_at };
                }
                Err(e) => match self.on_failure(&e.to_string()).await {
                    Some(outcome) => return outcome,
                    None => continue,
                },
            };

            self.pages_fetched += 1;

            if cursor.is_none() && page.total_match_count > settings.result_cap {
                match self.range.split() {
                    Some((lower, upper)) => {
                        shared.frontier.push_front_pair(lower, upper);
                        tracing::info!(
                            "Range {} has {} matches (cap {}), split into {} and {}",
                            self.range,
                            page.total_match_count,
                            settings.result_cap,
                            lower,
                            upper
                        );
                        return RangeOutcome::Split { lower, upper };
                    }
                    None => {
                        tracing::warn!(
                            "Range {} has {} matches but cannot be split further; only the first {} are reachable",
                            self.range,
                            page.total_match_count,
                            settings.result_cap
                        );
                    }
                }
            }

            if !page.records.is_empty() {
                let reservation =
                    match reserve_budget(&shared.progress, page.records.len(), self.range).await {
                        Some(reservation) => reservation,
                        None => return RangeOutcome::Drained,
                    };
                let granted = reservation.granted();

                let entities = translate_batch(&page.records[..granted]);
                match persist(&shared.repository, &entities) {
                    Ok(written) => {
                        let total = reservation.commit(written);
                        self.persisted += written.min(granted) as u64;
                        tracing::debug!(
                            "Range {}: persisted {} of {} records ({} / {})",
                            self.range,
                            written,
                            page.records.len(),
                            total,
                            shared.progress.target()
                        );
                    }
                    Err(e) => {
                        drop(reservation);
                        match self.on_failure(&format!("persist failed: {}", e)).await {
                            Some(outcome) => return outcome,
                            None => continue,
                        }
                    }
                }
            }

            // A page only ends the error streak once it is persisted
            self.retry.record_success();

            if shared.progress.is_complete() || !page.has_more {
                return RangeOutcome::Drained;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    tracing::warn!(
                        "Range {} reported more pages without a cursor, treating as drained",
                        self.range
                    );
                    return RangeOutcome::Drained;
                }
            }

            tokio::time::sleep(settings.inter_request_delay).await;
        }
    }

    /// Counts a failure; sleeps and returns `None` to retry, or the abandon outcome
    async fn on_failure(&mut self, reason: &str) -> Option<RangeOutcome> {
        match self.retry.record_failure() {
            RangeStep::RetryAfter(delay) => {
                tracing::warn!(
                    "Range {} failed ({} of {}): {}; retrying in {:?}",
                    self.range,
                    self.retry.consecutive_errors(),
                    self.retry.threshold(),
                    reason,
                    delay
                );
                tokio::time::sleep(delay).await;
                None
            }
            RangeStep::Abandon => {
                tracing::error!(
                    "Abandoning range {} after {} consecutive errors: {}",
                    self.range,
                    self.retry.consecutive_errors(),
                    reason
                );
                Some(RangeOutcome::Abandoned {
                    reason: reason.to_string(),
                })
            }
        }
    }
}

/// Reserves budget for up to `wanted` records
///
/// A zero grant below the target means other workers hold the rest of the
/// budget, and their reservations may still settle short. The worker keeps
/// its page and waits for them. Returns `None` once the target is reached.
async fn reserve_budget(
    progress: &Progress,
    wanted: usize,
    range: KeyRange,
) -> Option<Reservation<'_>> {
    let mut waited = false;
    loop {
        let reservation = progress.reserve(wanted);
        if reservation.granted() > 0 {
            return Some(reservation);
        }
        if progress.is_complete() {
            return None;
        }
        if !waited {
            tracing::debug!(
                "Range {}: remaining budget is reserved by other workers, waiting",
                range
            );
            waited = true;
        }
        tokio::time::sleep(BUDGET_POLL_INTERVAL).await;
    }
}

fn persist(repository: &SharedRepository, entities: &[RepoEntity]) -> StorageResult<usize> {
    if entities.is_empty() {
        return Ok(0);
    }
    let mut repository = repository.lock().unwrap_or_else(PoisonError::into_inner);
    repository.bulk_upsert(entities)
}
