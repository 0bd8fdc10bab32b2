//! Event Bus Module
//!
//! Typed publish/subscribe for cache state changes.
//!
//! Handlers register for one event kind and are invoked synchronously, in
//! registration order, on the publishing thread. A panicking handler is
//! logged and skipped; the remaining handlers still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::warn;

use crate::cache::SkipReason;

// == Event Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Stored,
    Skipped,
    Evicted,
    ScopeChanged,
    ScopePurged,
    CallbackSent,
}

/// Why records left the cache without an explicit delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionCause {
    Capacity,
    Expired,
}

// == Cache Event ==
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    /// A record was written
    Stored {
        key: String,
        scope: String,
        size_bytes: usize,
    },
    /// A write was rejected by the admission policy
    Skipped { key: String, reason: SkipReason },
    /// Records were removed by a sweep
    Evicted {
        cause: EvictionCause,
        keys: Vec<String>,
    },
    /// The host moved to a new scope
    ScopeChanged { previous: String, current: String },
    /// Records of a left scope were invalidated
    ScopePurged { scope: String, deleted: usize },
    /// An introspection request was answered
    CallbackSent {
        callback: String,
        request_id: Option<String>,
    },
}

impl CacheEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CacheEvent::Stored { .. } => EventKind::Stored,
            CacheEvent::Skipped { .. } => EventKind::Skipped,
            CacheEvent::Evicted { .. } => EventKind::Evicted,
            CacheEvent::ScopeChanged { .. } => EventKind::ScopeChanged,
            CacheEvent::ScopePurged { .. } => EventKind::ScopePurged,
            CacheEvent::CallbackSent { .. } => EventKind::CallbackSent,
        }
    }
}

// == Subscription ==
/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

// == Event Bus ==
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription {
            id,
            kind,
            handler: Arc::new(handler),
        };
        match self.subscriptions.write() {
            Ok(mut subs) => subs.push(subscription),
            Err(poisoned) => poisoned.into_inner().push(subscription),
        }
        id
    }

    /// Removes a handler. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = match self.subscriptions.write() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Delivers `event` to every handler registered for its kind.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn publish(&self, event: &CacheEvent) -> usize {
        let kind = event.kind();
        // Handlers run outside the lock so they may (un)subscribe.
        let handlers: Vec<Handler> = match self.subscriptions.read() {
            Ok(subs) => subs
                .iter()
                .filter(|s| s.kind == kind)
                .map(|s| Arc::clone(&s.handler))
                .collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .filter(|s| s.kind == kind)
                .map(|s| Arc::clone(&s.handler))
                .collect(),
        };

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(?kind, "Event handler panicked; continuing fan-out"),
            }
        }
        delivered
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().map(|s| s.len()).unwrap_or(0)
    }
}
