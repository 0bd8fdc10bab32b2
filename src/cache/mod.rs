//! Cache Module
//!
//! Policy-governed response storage with dedup, size cap, TTL expiration
//! and oldest-first capacity eviction.

mod clock;
mod dedup;
mod engine;
mod record;
mod stats;
mod store;


// Re-export public types
pub use clock::current_timestamp_ms;
pub use dedup::DedupGuard;
pub use engine::{CacheEngine, CachePolicy, SkipReason};
pub use record::{canonical_size, is_expired_at, CacheRecord, RecordMeta};
pub use stats::CacheStats;
pub use store::{MemoryStore, RecordStore};

// == Public Constants ==
/// Maximum number of keys the dedup guard tracks at once
pub const DEDUP_MAX_KEYS: usize = 4096;
