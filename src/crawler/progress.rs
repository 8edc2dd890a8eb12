//! Shared crawl progress against the target count
//!
//! Workers never hold this lock across I/O. Instead they reserve part of the
//! remaining budget before persisting and settle the reservation afterwards:
//!
//! 1. `reserve(n)` reads the remaining budget, truncates `n` to it, and books
//!    the result, all in one critical section.
//! 2. The worker translates and persists at most that many records.
//! 3. [`Reservation::commit`] releases the reservation and adds what was
//!    actually persisted. A reservation dropped without a commit (persist
//!    error, panic) gives its whole grant back.
//!
//! Since `persisted + reserved` never exceeds the target, concurrent workers
//! cannot overrun it no matter how their pages interleave. A zero grant while
//! the target is not complete only means other workers hold the budget; it
//! comes back when their reservations settle.

use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Counters {
    persisted: u64,
    reserved: u64,
}

/// Running total of persisted entities, shared by all range workers
#[derive(Debug)]
pub struct Progress {
    target: u64,
    counters: Mutex<Counters>,
}

impl Progress {
    pub fn new(target: u64) -> Self {
        Self {
            target,
            counters: Mutex::new(Counters::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    /// Entities persisted so far; monotonically increasing
    pub fn persisted(&self) -> u64 {
        self.lock().persisted
    }

    /// Budget not yet persisted nor reserved by an in-flight batch
    pub fn remaining(&self) -> u64 {
        let counters = self.lock();
        self.target
            .saturating_sub(counters.persisted)
            .saturating_sub(counters.reserved)
    }

    pub fn is_complete(&self) -> bool {
        self.lock().persisted >= self.target
    }

    /// Books up to `wanted` units of the remaining budget
    ///
    /// The grant is zero when the target is covered or fully reserved.
    pub fn reserve(&self, wanted: usize) -> Reservation<'_> {
        let mut counters = self.lock();
        let remaining = self
            .target
            .saturating_sub(counters.persisted)
            .saturating_sub(counters.reserved);
        let granted = (wanted as u64).min(remaining);
        counters.reserved += granted;
        Reservation {
            progress: self,
            granted: granted as usize,
        }
    }

    fn settle(&self, granted: usize, persisted: usize) -> u64 {
        let mut counters = self.lock();
        let granted = granted as u64;
        counters.reserved = counters.reserved.saturating_sub(granted);
        counters.persisted += (persisted as u64).min(granted);
        counters.persisted
    }
}

/// Budget booked by one worker for one page
#[derive(Debug)]
#[must_use = "dropping a reservation releases it"]
pub struct Reservation<'a> {
    progress: &'a Progress,
    granted: usize,
}

impl Reservation<'_> {
    pub fn granted(&self) -> usize {
        self.granted
    }

    /// Settles the reservation and returns the new persisted total
    ///
    /// `persisted` is clamped to the grant.
    pub fn commit(mut self, persisted: usize) -> u64 {
        let granted = std::mem::take(&mut self.granted);
        self.progress.settle(granted, persisted)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.granted > 0 {
            self.progress.settle(self.granted, 0);
        }
    }
}
