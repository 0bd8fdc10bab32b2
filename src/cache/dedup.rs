//! Dedup Guard Module
//!
//! Suppresses repeated writes to the same key within a short window.

use std::collections::HashMap;
use std::sync::Mutex;

// == Dedup Guard ==
/// Tracks the last accepted write attempt per key.
///
/// Ephemeral and process-local: losing it only means one redundant write.
/// Memory is bounded by `max_keys`; stale entries are purged when the map
/// fills up, and the stalest key is dropped if that is not enough.
#[derive(Debug)]
pub struct DedupGuard {
    /// Last accepted attempt (Unix milliseconds) per key
    last_attempt: Mutex<HashMap<String, u64>>,
    /// Minimum interval between two accepted writes to the same key
    window_ms: u64,
    /// Upper bound on tracked keys
    max_keys: usize,
}

impl DedupGuard {
    // == Constructor ==
    pub fn new(window_ms: u64, max_keys: usize) -> Self {
        Self {
            last_attempt: Mutex::new(HashMap::new()),
            window_ms,
            max_keys: max_keys.max(1),
        }
    }

    // == Check And Set ==
    /// Returns `true` if a write to `key` at `now_ms` falls inside the window
    /// of the previous accepted attempt. Otherwise records `now_ms` as the
    /// latest attempt and returns `false`.
    ///
    /// The check and the update happen under one lock, so of two concurrent
    /// callers only one is admitted.
    pub fn is_duplicate(&self, key: &str, now_ms: u64) -> bool {
        let mut map = match self.last_attempt.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(&last) = map.get(key) {
            if now_ms.saturating_sub(last) < self.window_ms {
                return true;
            }
        }

        if !map.contains_key(key) && map.len() >= self.max_keys {
            Self::purge_locked(&mut map, self.window_ms, now_ms);
            if map.len() >= self.max_keys {
                let stalest = map
                    .iter()
                    .min_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
                    .map(|(k, _)| k.clone());
                if let Some(stalest) = stalest {
                    map.remove(&stalest);
                }
            }
        }

        map.insert(key.to_string(), now_ms);
        false
    }

    // == Purge ==
    /// Drops entries whose window has already elapsed. Returns how many.
    pub fn purge(&self, now_ms: u64) -> usize {
        let mut map = match self.last_attempt.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::purge_locked(&mut map, self.window_ms, now_ms)
    }

    fn purge_locked(map: &mut HashMap<String, u64>, window_ms: u64, now_ms: u64) -> usize {
        let before = map.len();
        map.retain(|_, last| now_ms.saturating_sub(*last) < window_ms);
        before - map.len()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.last_attempt.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
