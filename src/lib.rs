//! Capture Cache - a transparent response cache
//!
//! Observes completed request/response exchanges, keeps the eligible ones
//! under a TTL, capacity and size policy, and invalidates them per scope.

pub mod api;
pub mod cache;
pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod scope;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEngine, CachePolicy, CacheRecord, MemoryStore, RecordMeta, RecordStore};
pub use capture::{CaptureAdapter, CaptureFilter, Exchange, FilterConfig, InterceptorChain};
pub use config::Config;
pub use error::CacheError;
pub use events::{CacheEvent, EventBus, EventKind};
pub use scope::{ScopeChange, ScopeTracker};
pub use tasks::spawn_cleanup_task;
