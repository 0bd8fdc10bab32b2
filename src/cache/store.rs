//! Record Store Module
//!
//! The ordered key-value storage seam behind the cache engine, and the
//! bundled in-memory backend.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::CacheRecord;
use crate::error::Result;

// == Record Store ==
/// Storage contract the cache engine is written against.
///
/// Backends report failures as `CacheError::StorageUnavailable`; the engine
/// turns every error into a miss or a skipped write.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Looks up a record by key.
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>>;

    /// Inserts a record, replacing any record with the same key.
    async fn put(&self, record: CacheRecord) -> Result<()>;

    /// Deletes a record. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Deletes a record only if it still carries `created_at`.
    ///
    /// Used for lazy expiry so a concurrent overwrite is never lost.
    async fn delete_if_created_at(&self, key: &str, created_at: u64) -> Result<bool>;

    /// Snapshot of all records, in key order.
    async fn all(&self) -> Result<Vec<CacheRecord>>;

    /// `(key, created_at)` of every record, in key order. Payloads are not
    /// read.
    async fn stamps(&self) -> Result<Vec<(String, u64)>>;

    /// Records whose scope equals `scope`.
    async fn by_scope(&self, scope: &str) -> Result<Vec<CacheRecord>>;

    /// Deletes records whose scope equals `scope`. Returns how many.
    async fn delete_by_scope(&self, scope: &str) -> Result<usize>;

    /// Deletes records created strictly before `cutoff_ms`.
    /// Returns the deleted keys, oldest first.
    async fn delete_created_before(&self, cutoff_ms: u64) -> Result<Vec<String>>;

    /// Deletes the `count` oldest records by `(created_at, key)`.
    /// Returns the deleted keys.
    async fn delete_oldest(&self, count: usize) -> Result<Vec<String>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Deletes every record.
    async fn clear(&self) -> Result<()>;
}

// == Memory Store ==
/// In-memory `RecordStore` with a creation-time index and a scope index.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    /// Primary table, ordered by key
    records: BTreeMap<String, CacheRecord>,
    /// (created_at, key), ordered oldest first
    by_created: BTreeSet<(u64, String)>,
    /// scope -> keys
    by_scope: HashMap<String, BTreeSet<String>>,
}

impl Tables {
    fn insert(&mut self, record: CacheRecord) {
        self.remove(&record.key);
        self.by_created
            .insert((record.created_at, record.key.clone()));
        self.by_scope
            .entry(record.scope.clone())
            .or_default()
            .insert(record.key.clone());
        self.records.insert(record.key.clone(), record);
    }

    fn remove(&mut self, key: &str) -> Option<CacheRecord> {
        let record = self.records.remove(key)?;
        self.by_created
            .remove(&(record.created_at, record.key.clone()));
        if let Some(keys) = self.by_scope.get_mut(&record.scope) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_scope.remove(&record.scope);
            }
        }
        Some(record)
    }
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>> {
        Ok(self.inner.read().await.records.get(key).cloned())
    }

    async fn put(&self, record: CacheRecord) -> Result<()> {
        self.inner.write().await.insert(record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.inner.write().await.remove(key).is_some())
    }

    async fn delete_if_created_at(&self, key: &str, created_at: u64) -> Result<bool> {
        let mut tables = self.inner.write().await;
        let unchanged = tables
            .records
            .get(key)
            .is_some_and(|record| record.created_at == created_at);
        if unchanged {
            tables.remove(key);
        }
        Ok(unchanged)
    }

    async fn all(&self) -> Result<Vec<CacheRecord>> {
        Ok(self.inner.read().await.records.values().cloned().collect())
    }

    async fn stamps(&self) -> Result<Vec<(String, u64)>> {
        let tables = self.inner.read().await;
        Ok(tables
            .records
            .iter()
            .map(|(key, record)| (key.clone(), record.created_at))
            .collect())
    }

    async fn by_scope(&self, scope: &str) -> Result<Vec<CacheRecord>> {
        let tables = self.inner.read().await;
        let records = tables
            .by_scope
            .get(scope)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| tables.records.get(k).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn delete_by_scope(&self, scope: &str) -> Result<usize> {
        let mut tables = self.inner.write().await;
        let keys: Vec<String> = tables
            .by_scope
            .get(scope)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        for key in &keys {
            tables.remove(key);
        }
        Ok(keys.len())
    }

    async fn delete_created_before(&self, cutoff_ms: u64) -> Result<Vec<String>> {
        let mut tables = self.inner.write().await;
        // (cutoff, "") sorts before every entry stamped at cutoff
        let keys: Vec<String> = tables
            .by_created
            .range(..(cutoff_ms, String::new()))
            .map(|(_, key)| key.clone())
            .collect();
        for key in &keys {
            tables.remove(key);
        }
        Ok(keys)
    }

    async fn delete_oldest(&self, count: usize) -> Result<Vec<String>> {
        let mut tables = self.inner.write().await;
        let keys: Vec<String> = tables
            .by_created
            .iter()
            .take(count)
            .map(|(_, key)| key.clone())
            .collect();
        for key in &keys {
            tables.remove(key);
        }
        Ok(keys)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.inner.read().await.records.len())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.write().await = Tables::default();
        Ok(())
    }
}
