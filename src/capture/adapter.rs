//! Capture Adapter
//!
//! Connects the filter and the engine to the host's interceptor chain.
//! Nothing here can fail or delay the exchange it observes: checks are
//! synchronous and cheap, the body is decoded and written in a spawned task,
//! and every step runs inside a panic boundary.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{CacheEngine, CacheRecord, MemoryStore, RecordMeta, RecordStore};
use crate::capture::{CaptureFilter, Exchange, ExchangeBody, ExchangeInterceptor};
use crate::scope::ScopeTracker;

pub struct CaptureAdapter<S = MemoryStore> {
    filter: Arc<CaptureFilter>,
    engine: Arc<CacheEngine<S>>,
    scope: Arc<ScopeTracker<S>>,
}

impl<S: RecordStore + 'static> CaptureAdapter<S> {
    pub fn new(
        filter: Arc<CaptureFilter>,
        engine: Arc<CacheEngine<S>>,
        scope: Arc<ScopeTracker<S>>,
    ) -> Self {
        Self {
            filter,
            engine,
            scope,
        }
    }

    // == Capture ==
    /// Schedules a cache write for `exchange` if it is eligible.
    ///
    /// Returns the handle of the write task, or `None` when the exchange was
    /// rejected before any body work. Callers on the traffic path drop the
    /// handle; tests await it.
    pub fn capture(&self, exchange: Exchange) -> Option<JoinHandle<Option<CacheRecord>>> {
        let url = exchange.url.clone();
        match catch_unwind(AssertUnwindSafe(|| self.schedule(exchange))) {
            Ok(handle) => handle,
            Err(_) => {
                warn!(url = %url, "Capture panicked; exchange unaffected");
                None
            }
        }
    }

    fn schedule(&self, exchange: Exchange) -> Option<JoinHandle<Option<CacheRecord>>> {
        let started = Instant::now();
        if !self.filter.should_capture(&exchange.url, &exchange.method) {
            return None;
        }
        if !exchange.is_success() {
            debug!(url = %exchange.url, status = exchange.status, "Not capturing non-2xx response");
            return None;
        }
        if !self
            .filter
            .should_capture_content_type(exchange.content_type.as_deref())
        {
            debug!(
                url = %exchange.url,
                content_type = ?exchange.content_type,
                "Not capturing content type"
            );
            return None;
        }
        match &exchange.body {
            ExchangeBody::Failed(error) => {
                debug!(url = %exchange.url, error = %error, "Not capturing failed exchange");
                return None;
            }
            ExchangeBody::Empty => {
                debug!(url = %exchange.url, "Not capturing exchange without a body");
                return None;
            }
            ExchangeBody::Bytes(_) | ExchangeBody::Json(_) => {}
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(url = %exchange.url, error = %e, "No runtime; capture dropped");
                return None;
            }
        };

        let key = self.filter.build_key(&exchange.url);
        let meta = RecordMeta::new(exchange.url, self.scope.current())
            .with_method(exchange.method.to_ascii_uppercase())
            .with_status(exchange.status);
        let engine = Arc::clone(&self.engine);
        let body = exchange.body;

        Some(runtime.spawn(async move {
            let record = match decode(&key, body) {
                Some(payload) => engine.put(key.as_str(), payload, meta).await,
                None => None,
            };
            let elapsed = started.elapsed();
            engine.record_capture_time(elapsed);
            debug!(
                key = %key,
                stored = record.is_some(),
                elapsed_us = elapsed.as_micros() as u64,
                "Capture finished"
            );
            record
        }))
    }
}

/// Materialises the body as JSON. Undecodable bodies are skipped.
fn decode(key: &str, body: ExchangeBody) -> Option<Value> {
    match body {
        ExchangeBody::Json(payload) => Some(payload),
        ExchangeBody::Bytes(bytes) => match serde_json::from_slice(&bytes) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(key, error = %e, "Response body is not valid JSON; skipping");
                None
            }
        },
        ExchangeBody::Failed(_) | ExchangeBody::Empty => None,
    }
}

impl<S: RecordStore + 'static> ExchangeInterceptor for CaptureAdapter<S> {
    fn wants(&self, url: &str, method: &str) -> bool {
        self.filter.should_capture(url, method)
    }

    fn on_exchange(&self, exchange: Exchange) {
        // The write is detached; its outcome never reaches the transport
        drop(self.capture(exchange));
    }
}

impl<S> std::fmt::Debug for CaptureAdapter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureAdapter")
            .field("filter", &self.filter)
            .finish()
    }
}
