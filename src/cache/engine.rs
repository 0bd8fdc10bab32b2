//! Cache Engine Module
//!
//! Policy-governed store: admission control (dedup, size cap), retrieval
//! with lazy expiry, and TTL / capacity sweeps.
//!
//! No operation here returns an error. Store failures are logged and turn
//! into a miss, an empty result or a skipped write, so a broken backend
//! behaves like an empty cache.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::cache::{
    canonical_size, current_timestamp_ms, is_expired_at, CacheRecord, CacheStats, DedupGuard, MemoryStore,
    RecordMeta, RecordStore, DEDUP_MAX_KEYS,
};
use crate::error::Result;
use crate::events::{CacheEvent, EventBus, EvictionCause};

// == Cache Policy ==
/// Admission and eviction limits, fixed for the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Record time-to-live in milliseconds
    pub ttl_ms: u64,
    /// Maximum number of stored records
    pub max_entries: usize,
    /// Maximum canonical payload size of one record
    pub max_item_size_bytes: usize,
    /// Minimum interval between accepted writes to the same key
    pub dedup_window_ms: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl_ms: 5 * 60 * 1000,
            max_entries: 100,
            max_item_size_bytes: 100 * 1024 * 1024,
            dedup_window_ms: 1000,
        }
    }
}

// == Skip Reason ==
/// Why `put` did not store a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Same key written within the dedup window
    Duplicate,
    /// Payload larger than the item size cap
    Oversize,
    /// Payload could not be serialized for measuring
    SerializationFailure,
    /// The store rejected the write
    StorageUnavailable,
}

// == Cache Engine ==
pub struct CacheEngine<S = MemoryStore> {
    /// Injected record store
    store: S,
    policy: CachePolicy,
    dedup: DedupGuard,
    stats: Mutex<CacheStats>,
    events: Arc<EventBus>,
    /// Serializes the sweep-then-write section of admissions
    write_gate: AsyncMutex<()>,
}

impl<S: RecordStore> CacheEngine<S> {
    // == Constructor ==
    /// Creates an engine owning `store`, with its own event bus.
    pub fn new(store: S, policy: CachePolicy) -> Self {
        Self::with_events(store, policy, Arc::new(EventBus::new()))
    }

    /// Creates an engine publishing to a shared event bus.
    pub fn with_events(store: S, policy: CachePolicy, events: Arc<EventBus>) -> Self {
        Self {
            store,
            policy,
            dedup: DedupGuard::new(policy.dedup_window_ms, DEDUP_MAX_KEYS),
            stats: Mutex::new(CacheStats::new()),
            events,
            write_gate: AsyncMutex::new(()),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // == Put ==
    /// Stores `payload` under `key` unless the admission policy rejects it.
    ///
    /// Returns the written record, or `None` if the write was skipped.
    pub async fn put(
        &self,
        key: impl Into<String>,
        payload: Value,
        meta: RecordMeta,
    ) -> Option<CacheRecord> {
        self.try_put(key.into(), payload, meta).await.ok()
    }

    /// Like `put`, but reports why a write was skipped.
    ///
    /// Checks run in order and stop at the first rejection: dedup window,
    /// size cap, then (best effort) TTL sweep and capacity sweep, then the
    /// write itself.
    pub async fn try_put(
        &self,
        key: String,
        payload: Value,
        meta: RecordMeta,
    ) -> std::result::Result<CacheRecord, SkipReason> {
        if self.dedup.is_duplicate(&key, current_timestamp_ms()) {
            debug!(key = %key, "Skipping duplicate write");
            self.with_stats(CacheStats::record_duplicate);
            return Err(self.skipped(key, SkipReason::Duplicate));
        }

        let size_bytes = match canonical_size(&payload) {
            Ok(size) => size,
            Err(e) => {
                warn!(key = %key, error = %e, "Payload serialization failed; skipping write");
                self.with_stats(CacheStats::record_oversize);
                return Err(self.skipped(key, SkipReason::SerializationFailure));
            }
        };
        if size_bytes > self.policy.max_item_size_bytes {
            debug!(
                key = %key,
                size_bytes,
                max = self.policy.max_item_size_bytes,
                "Skipping oversize payload"
            );
            self.with_stats(CacheStats::record_oversize);
            return Err(self.skipped(key, SkipReason::Oversize));
        }

        let _gate = self.write_gate.lock().await;

        if let Err(e) = self.sweep_expired(current_timestamp_ms()).await {
            warn!(error = %e, "TTL sweep failed during put");
        }
        if let Err(e) = self.make_room_for(&key).await {
            warn!(error = %e, "Capacity sweep failed during put");
        }

        let record = CacheRecord::new(key, payload, meta, size_bytes, current_timestamp_ms());
        if let Err(e) = self.store.put(record.clone()).await {
            warn!(key = %record.key, error = %e, "Store write failed; skipping");
            return Err(self.skipped(record.key, SkipReason::StorageUnavailable));
        }

        debug!(key = %record.key, size_bytes, scope = %record.scope, "Stored record");
        self.with_stats(CacheStats::record_store);
        self.events.publish(&CacheEvent::Stored {
            key: record.key.clone(),
            scope: record.scope.clone(),
            size_bytes,
        });
        Ok(record)
    }

    // == Get ==
    /// Returns the live record for `key`.
    ///
    /// An expired record is deleted as a side effect and reported as absent.
    pub async fn get(&self, key: &str) -> Option<CacheRecord> {
        let record = match self.store.get(key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.with_stats(CacheStats::record_miss);
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Store read failed; treating as miss");
                self.with_stats(CacheStats::record_miss);
                return None;
            }
        };

        if record.is_expired(self.policy.ttl_ms, current_timestamp_ms()) {
            match self
                .store
                .delete_if_created_at(key, record.created_at)
                .await
            {
                Ok(true) => {
                    debug!(key, "Expired record removed on read");
                    self.with_stats(|s| s.record_expirations(1));
                    self.events.publish(&CacheEvent::Evicted {
                        cause: EvictionCause::Expired,
                        keys: vec![key.to_string()],
                    });
                }
                Ok(false) => {}
                Err(e) => warn!(key, error = %e, "Failed to delete expired record"),
            }
            self.with_stats(CacheStats::record_miss);
            return None;
        }

        self.with_stats(CacheStats::record_hit);
        Some(record)
    }

    // == Snapshots ==
    /// All live records, in store order.
    pub async fn get_all(&self) -> Vec<CacheRecord> {
        match self.store.all().await {
            Ok(records) => self.live(records),
            Err(e) => {
                warn!(error = %e, "Store scan failed; returning empty snapshot");
                Vec::new()
            }
        }
    }

    /// Keys of all live records, in store order.
    pub async fn get_all_keys(&self) -> Vec<String> {
        match self.store.stamps().await {
            Ok(stamps) => {
                let now = current_timestamp_ms();
                stamps
                    .into_iter()
                    .filter(|(_, created_at)| !is_expired_at(*created_at, self.policy.ttl_ms, now))
                    .map(|(key, _)| key)
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "Key listing failed; returning empty snapshot");
                Vec::new()
            }
        }
    }

    /// Live records written under `scope`.
    pub async fn get_by_scope(&self, scope: &str) -> Vec<CacheRecord> {
        match self.store.by_scope(scope).await {
            Ok(records) => self.live(records),
            Err(e) => {
                warn!(scope, error = %e, "Scope lookup failed; returning empty result");
                Vec::new()
            }
        }
    }

    // == Deletion ==
    /// Deletes every record written under `scope`. Returns how many.
    pub async fn delete_by_scope(&self, scope: &str) -> usize {
        match self.store.delete_by_scope(scope).await {
            Ok(deleted) => {
                if deleted > 0 {
                    info!(scope, deleted, "Invalidated scope records");
                }
                self.with_stats(|s| s.record_scope_purge(deleted));
                deleted
            }
            Err(e) => {
                warn!(scope, error = %e, "Scope invalidation failed");
                0
            }
        }
    }

    /// Deletes the record for `key`. Returns whether one existed.
    pub async fn remove(&self, key: &str) -> bool {
        self.store.delete(key).await.unwrap_or_else(|e| {
            warn!(key, error = %e, "Delete failed");
            false
        })
    }

    /// Deletes every record.
    pub async fn clear(&self) {
        match self.store.clear().await {
            Ok(()) => info!("Cache cleared"),
            Err(e) => warn!(error = %e, "Clear failed"),
        }
    }

    // == Sweeps ==
    /// Removes every expired record. Returns how many.
    pub async fn evict_expired(&self) -> usize {
        self.sweep_expired(current_timestamp_ms())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "TTL sweep failed");
                0
            })
    }

    /// Removes the oldest records until at most `max_entries` remain.
    /// Returns how many.
    pub async fn evict_oldest(&self) -> usize {
        let _gate = self.write_gate.lock().await;
        let result = match self.store.count().await {
            Ok(count) => self.evict(count.saturating_sub(self.policy.max_entries)).await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "Capacity sweep failed");
            0
        })
    }

    /// Drops dedup entries whose window has elapsed. Returns how many.
    pub fn purge_dedup(&self) -> usize {
        self.dedup.purge(current_timestamp_ms())
    }

    /// Adds one capture's end-to-end duration to the timing counters.
    pub fn record_capture_time(&self, elapsed: Duration) {
        self.with_stats(|s| s.record_capture_time(elapsed));
    }

    // == Count ==
    /// Number of stored records, including expired ones not yet swept.
    pub async fn count(&self) -> usize {
        self.store.count().await.unwrap_or_else(|e| {
            warn!(error = %e, "Count failed");
            0
        })
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let total = self.count().await;
        let mut stats = match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        stats.set_total_entries(total);
        stats
    }

    // == Internals ==
    async fn sweep_expired(&self, now_ms: u64) -> Result<usize> {
        let cutoff = now_ms.saturating_sub(self.policy.ttl_ms);
        let keys = self.store.delete_created_before(cutoff).await?;
        let removed = keys.len();
        if removed > 0 {
            info!(removed, "TTL sweep removed expired records");
            self.with_stats(|s| s.record_expirations(removed));
            self.events.publish(&CacheEvent::Evicted {
                cause: EvictionCause::Expired,
                keys,
            });
        }
        Ok(removed)
    }

    /// Frees one slot below capacity when `key` is not already stored.
    async fn make_room_for(&self, key: &str) -> Result<usize> {
        if self.store.get(key).await?.is_some() {
            return Ok(0);
        }
        let count = self.store.count().await?;
        if count < self.policy.max_entries {
            return Ok(0);
        }
        self.evict(count + 1 - self.policy.max_entries).await
    }

    async fn evict(&self, excess: usize) -> Result<usize> {
        if excess == 0 {
            return Ok(0);
        }
        let keys = self.store.delete_oldest(excess).await?;
        let evicted = keys.len();
        if evicted > 0 {
            info!(evicted, "Capacity sweep evicted oldest records");
            self.with_stats(|s| s.record_evictions(evicted));
            self.events.publish(&CacheEvent::Evicted {
                cause: EvictionCause::Capacity,
                keys,
            });
        }
        Ok(evicted)
    }

    fn live(&self, records: Vec<CacheRecord>) -> Vec<CacheRecord> {
        let now = current_timestamp_ms();
        records
            .into_iter()
            .filter(|r| !r.is_expired(self.policy.ttl_ms, now))
            .collect()
    }

    fn skipped(&self, key: String, reason: SkipReason) -> SkipReason {
        self.events.publish(&CacheEvent::Skipped { key, reason });
        reason
    }

    fn with_stats(&self, f: impl FnOnce(&mut CacheStats)) {
        match self.stats.lock() {
            Ok(mut stats) => f(&mut stats),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl<S> std::fmt::Debug for CacheEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("policy", &self.policy)
            .field("dedup_keys", &self.dedup.len())
            .finish()
    }
}
