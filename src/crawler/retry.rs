//! Retry and backoff state machines
//!
//! Two tiers cooperate:
//! - [`FetchRetry`] lives inside a single page fetch. It absorbs short-lived
//!   faults (5xx, network errors, secondary rate limits) with exponential
//!   backoff, jitter, and page-size degradation.
//! - [`RangeRetry`] lives inside a range worker. It counts fetches that failed
//!   even after the fetch tier gave up, and eventually abandons the range.
//!
//! Both are plain counters that compute delays; callers do the sleeping, so the
//! schedules can be tested without a runtime.

use crate::config::ApiConfig;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Backoff settings for the fetch tier
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Attempts per fetch, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the jitter added to each transient backoff
    pub jitter: Duration,
    /// Floor for page-size halving
    pub min_page_size: u32,
    /// Wait used when a secondary limit response says nothing about timing
    pub secondary_fallback: Duration,
}

impl BackoffPolicy {
    pub fn from_api_config(config: &ApiConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            jitter: Duration::from_millis(config.retry_jitter_ms),
            min_page_size: config.min_page_size.max(1),
            secondary_fallback: Duration::from_secs(config.secondary_limit_fallback_secs),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_api_config(&ApiConfig::default())
    }
}

/// What the fetch tier should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStep {
    /// Sleep for `delay`, then try again
    Retry { delay: Duration },
    /// The retry budget is spent
    GiveUp,
}

/// Per-fetch retry state: attempt counter plus the current page-size hint
#[derive(Debug, Clone)]
pub struct FetchRetry {
    policy: BackoffPolicy,
    attempt: u32,
    page_size: u32,
    seed: u64,
}

impl FetchRetry {
    /// `seed` decorrelates the jitter of concurrent fetches
    pub fn new(policy: BackoffPolicy, page_size: u32, seed: u64) -> Self {
        let page_size = page_size.max(policy.min_page_size);
        Self {
            policy,
            attempt: 0,
            page_size,
            seed,
        }
    }

    /// Marks the start of an attempt and returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Page size to request on the next attempt
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn exhausted(&self) -> bool {
        self.attempt >= self.policy.max_attempts
    }

    /// Server error, network failure, or a response without usable payload
    ///
    /// Halves the page size (never below the floor) and backs off exponentially.
    pub fn on_transient(&mut self) -> FetchStep {
        if self.exhausted() {
            return FetchStep::GiveUp;
        }

        self.page_size = (self.page_size / 2).max(self.policy.min_page_size);
        FetchStep::Retry {
            delay: compute_backoff_delay(&self.policy, self.attempt, self.seed),
        }
    }

    /// Explicit "slow down" response; the page size is left alone
    pub fn on_secondary_limit(&mut self, retry_after: Option<Duration>) -> FetchStep {
        if self.exhausted() {
            return FetchStep::GiveUp;
        }

        FetchStep::Retry {
            delay: retry_after.unwrap_or(self.policy.secondary_fallback),
        }
    }
}

/// Exponential backoff for the given 1-based attempt, capped, plus jitter
pub fn compute_backoff_delay(policy: &BackoffPolicy, attempt: u32, seed: u64) -> Duration {
    let shift = u32::min(attempt.saturating_sub(1), 20);
    let exponential_ms = policy
        .base_delay
        .as_millis()
        .saturating_mul(1u128 << shift);
    let capped_ms = exponential_ms.min(policy.max_delay.as_millis());

    let jitter_ms = jitter(seed, attempt, policy.jitter.as_millis());

    let total_ms = capped_ms.saturating_add(jitter_ms);
    Duration::from_millis(total_ms.min(u64::MAX as u128) as u64)
}

/// Mixes seed and attempt into a value in `0..=cap` (splitmix64 finalizer)
fn jitter(seed: u64, attempt: u32, cap: u128) -> u128 {
    if cap == 0 {
        return 0;
    }

    let mut x = seed ^ (attempt as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;

    (x as u128) % (cap + 1)
}

/// What a range worker should do after a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStep {
    /// Sleep, then retry the same cursor
    RetryAfter(Duration),
    /// Give up on the range
    Abandon,
}

/// Range-tier retry state; not shared between workers
#[derive(Debug, Clone)]
pub struct RangeRetry {
    consecutive_errors: u32,
    threshold: u32,
    unit: Duration,
}

impl RangeRetry {
    pub fn new(threshold: u32, unit: Duration) -> Self {
        Self {
            consecutive_errors: 0,
            threshold: threshold.max(1),
            unit,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Any successful page fetch resets the counter
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    /// The n-th consecutive failure sleeps `n * unit`; reaching the threshold abandons
    pub fn record_failure(&mut self) -> RangeStep {
        self.consecutive_errors += 1;
        if self.consecutive_errors >= self.threshold {
            RangeStep::Abandon
        } else {
            RangeStep::RetryAfter(self.unit * self.consecutive_errors)
        }
    }
}

/// How long to pause all workers after the primary quota ran out
///
/// `reset_at - now + buffer`, never less than one second.
pub fn quota_wait(reset_at: DateTime<Utc>, now: DateTime<Utc>, buffer: Duration) -> Duration {
    let floor = Duration::from_secs(1);
    let buffer = chrono::Duration::from_std(buffer).unwrap_or_else(|_| chrono::Duration::zero());
    (reset_at - now + buffer)
        .to_std()
        .map(|wait| wait.max(floor))
        .unwrap_or(floor)
}
