//! Scope Tracker
//!
//! Tracks the host's current logical scope and invalidates the records of a
//! scope once the host leaves it.

use std::sync::{Arc, RwLock};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheEngine, MemoryStore, RecordStore};
use crate::events::CacheEvent;

/// Outcome of a scope transition.
#[derive(Debug)]
pub struct ScopeChange {
    /// Scope that was replaced, read under the same lock as the swap
    pub previous: String,
    /// Purge of `previous`; `None` outside a tokio runtime
    pub purge: Option<JoinHandle<usize>>,
}

pub struct ScopeTracker<S = MemoryStore> {
    current: RwLock<String>,
    engine: Arc<CacheEngine<S>>,
}

impl<S: RecordStore + 'static> ScopeTracker<S> {
    pub fn new(engine: Arc<CacheEngine<S>>, initial_scope: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(initial_scope.into()),
            engine,
        }
    }

    /// Scope new records are tagged with.
    pub fn current(&self) -> String {
        match self.current.read() {
            Ok(scope) => scope.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    // == On Scope Change ==
    /// Moves to `new_scope` and schedules invalidation of the previous one.
    ///
    /// Returns `None` when `new_scope` is already current. The transition
    /// itself is immediate; the purge runs in a spawned task whose handle is
    /// returned for callers that want to await it. Outside a tokio runtime
    /// the transition still happens but no purge is scheduled.
    pub fn on_scope_change(&self, new_scope: &str) -> Option<ScopeChange> {
        let previous = {
            let mut current = match self.current.write() {
                Ok(current) => current,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *current == new_scope {
                debug!(scope = new_scope, "Scope unchanged");
                return None;
            }
            std::mem::replace(&mut *current, new_scope.to_string())
        };

        info!(previous = %previous, current = new_scope, "Scope changed");
        self.engine.events().publish(&CacheEvent::ScopeChanged {
            previous: previous.clone(),
            current: new_scope.to_string(),
        });

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(scope = %previous, error = %e, "No runtime; scope records not purged");
                return Some(ScopeChange {
                    previous,
                    purge: None,
                });
            }
        };

        let engine = Arc::clone(&self.engine);
        let scope = previous.clone();
        let purge = runtime.spawn(async move {
            // Store failures are logged inside the engine and count as zero
            let deleted = engine.delete_by_scope(&scope).await;
            engine.events().publish(&CacheEvent::ScopePurged { scope, deleted });
            deleted
        });
        Some(ScopeChange {
            previous,
            purge: Some(purge),
        })
    }
}

impl<S> std::fmt::Debug for ScopeTracker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeTracker")
            .field("current", &self.current)
            .finish()
    }
}
