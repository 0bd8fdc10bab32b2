//! Cache Statistics Module
//!
//! Tracks read outcomes, admission decisions and evictions.

use std::time::Duration;

use serde::Serialize;

// == Cache Stats ==
/// Cache performance and policy counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of records written
    pub stored: u64,
    /// Writes skipped inside the dedup window
    pub duplicates_skipped: u64,
    /// Writes skipped for exceeding the item size cap
    pub oversize_skipped: u64,
    /// Records evicted by the capacity sweep
    pub evictions: u64,
    /// Records removed because their TTL elapsed
    pub expirations: u64,
    /// Records removed by scope invalidation
    pub scope_purges: u64,
    /// Background captures whose decode-and-store work was timed
    pub captures_timed: u64,
    /// Sum of timed capture durations, in microseconds
    pub capture_time_total_us: u64,
    /// Slowest timed capture, in microseconds
    pub capture_time_max_us: u64,
    /// Current number of records in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_store(&mut self) {
        self.stored += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.duplicates_skipped += 1;
    }

    pub fn record_oversize(&mut self) {
        self.oversize_skipped += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn record_scope_purge(&mut self, count: usize) {
        self.scope_purges += count as u64;
    }

    // == Capture Timing ==
    pub fn record_capture_time(&mut self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.captures_timed += 1;
        self.capture_time_total_us = self.capture_time_total_us.saturating_add(micros);
        self.capture_time_max_us = self.capture_time_max_us.max(micros);
    }

    /// Mean capture duration in milliseconds, or 0.0 before any capture.
    pub fn avg_capture_ms(&self) -> f64 {
        if self.captures_timed == 0 {
            0.0
        } else {
            self.capture_time_total_us as f64 / self.captures_timed as f64 / 1000.0
        }
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
