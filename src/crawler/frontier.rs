//! Key ranges and the frontier queue of ranges awaiting a crawl

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Inclusive interval `[low, high]` of the partition key (star count)
///
/// Immutable; a range is only ever replaced by its two halves or consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyRange {
    low: u64,
    high: u64,
}

impl KeyRange {
    /// Returns `None` when `low > high`
    pub fn new(low: u64, high: u64) -> Option<Self> {
        (low <= high).then_some(Self { low, high })
    }

    pub fn low(&self) -> u64 {
        self.low
    }

    pub fn high(&self) -> u64 {
        self.high
    }

    /// `high - low`; zero for a single key value
    pub fn width(&self) -> u64 {
        self.high - self.low
    }

    /// Search predicate for this range, e.g. `stars:10..20`
    pub fn predicate(&self, field: &str) -> String {
        format!("{}:{}..{}", field, self.low, self.high)
    }

    /// Splits at `mid = floor((low + high) / 2)` into `[low, mid]` and `[mid + 1, high]`
    ///
    /// Returns `None` unless `mid > low`, so every split makes progress. The two
    /// halves cover the parent exactly once.
    pub fn split(&self) -> Option<(KeyRange, KeyRange)> {
        if self.width() == 0 {
            return None;
        }

        // low + (high - low) / 2 == floor((low + high) / 2) without overflow
        let mid = self.low + (self.high - self.low) / 2;
        if mid <= self.low {
            return None;
        }

        Some((
            KeyRange {
                low: self.low,
                high: mid,
            },
            KeyRange {
                low: mid + 1,
                high: self.high,
            },
        ))
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.low, self.high)
    }
}

/// Thread-safe double-ended queue of ranges waiting to be crawled
///
/// Splits and re-queued ranges go to the front so they are served before
/// older backlog. The lock is only held for the in-memory mutation.
#[derive(Debug, Default)]
pub struct Frontier {
    ranges: Mutex<VecDeque<KeyRange>>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frontier holding one full-domain range
    pub fn seeded(range: KeyRange) -> Self {
        Self {
            ranges: Mutex::new(VecDeque::from([range])),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<KeyRange>> {
        self.ranges.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_front(&self, range: KeyRange) {
        self.lock().push_front(range);
    }

    /// Pushes both halves of a split in one critical section, `first` ending up in front
    pub fn push_front_pair(&self, first: KeyRange, second: KeyRange) {
        let mut ranges = self.lock();
        ranges.push_front(second);
        ranges.push_front(first);
    }

    /// Removes up to `max` ranges from the front
    pub fn pop_batch(&self, max: usize) -> Vec<KeyRange> {
        let mut ranges = self.lock();
        let take = max.min(ranges.len());
        ranges.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
