//! Clock Module
//!
//! Wall-clock milliseconds used for record timestamps, TTL and dedup checks.

/// Returns the current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    #[cfg(not(test))]
    {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }

    // Unit tests read tokio's clock, so paused time (`tokio::time::pause` /
    // `advance`) drives TTL and dedup windows exactly.
    #[cfg(test)]
    {
        paused::now_ms()
    }
}
