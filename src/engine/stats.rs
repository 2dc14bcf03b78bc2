//! Liveness counters
//!
//! Three independent signed counters, updated with atomic adds and readable
//! at any time without locking.

use std::sync::atomic::{AtomicI64, Ordering};

/// Engine counters
#[derive(Debug, Default)]
pub struct Stats {
    crawling_count: AtomicI64,
    crawled_count: AtomicI64,
    failed_count: AtomicI64,
}

/// Point-in-time copy of [`Stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Tasks currently in flight
    pub crawling: i64,

    /// Tasks that completed successfully
    pub crawled: i64,

    /// Tasks that failed at any stage
    pub failed: i64,
}

impl StatsSnapshot {
    /// Tasks that have finished either way
    pub fn completed(&self) -> i64 {
        self.crawled + self.failed
    }
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_crawling_count(&self, v: i64) {
        self.crawling_count.fetch_add(v, Ordering::SeqCst);
    }

    pub fn incr_crawled_count(&self, v: i64) {
        self.crawled_count.fetch_add(v, Ordering::SeqCst);
    }

    pub fn incr_failed_count(&self, v: i64) {
        self.failed_count.fetch_add(v, Ordering::SeqCst);
    }

    pub fn crawling_count(&self) -> i64 {
        self.crawling_count.load(Ordering::SeqCst)
    }

    pub fn crawled_count(&self) -> i64 {
        self.crawled_count.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> i64 {
        self.failed_count.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            crawling: self.crawling_count(),
            crawled: self.crawled_count(),
            failed: self.failed_count(),
        }
    }
}

/// Holds one unit of `crawling_count` for as long as it lives
///
/// Dropping the guard decrements the counter, so every exit path of a task
/// (including a panic) releases it.
pub(crate) struct InFlight<'a> {
    stats: &'a Stats,
}

impl<'a> InFlight<'a> {
    pub(crate) fn enter(stats: &'a Stats) -> Self {
        stats.incr_crawling_count(1);
        Self { stats }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.stats.incr_crawling_count(-1);
    }
}
