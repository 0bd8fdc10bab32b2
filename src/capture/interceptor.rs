//! Interceptor Registration
//!
//! The host transport holds an `InterceptorChain` and hands every completed
//! exchange to it. Interceptors observe; they cannot alter the response the
//! original caller receives.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

// == Exchange ==
/// Body of a completed exchange, as the transport saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeBody {
    /// Raw response bytes, not yet decoded
    Bytes(Vec<u8>),
    /// Body the transport already decoded
    Json(Value),
    /// The response carried no body
    Empty,
    /// The request failed; no body is available
    Failed(String),
}

/// One completed request/response pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ExchangeBody,
}

impl Exchange {
    /// A successful JSON exchange with an already-decoded body.
    pub fn json(url: impl Into<String>, method: impl Into<String>, payload: Value) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            status: 200,
            content_type: Some("application/json".to_string()),
            body: ExchangeBody::Json(payload),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: Option<&str>) -> Self {
        self.content_type = content_type.map(str::to_string);
        self
    }

    pub fn with_body(mut self, body: ExchangeBody) -> Self {
        self.body = body;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// == Exchange Interceptor ==
/// A callback registered with the host transport.
pub trait ExchangeInterceptor: Send + Sync {
    /// Request-time hint: whether this interceptor cares about the exchange.
    fn wants(&self, url: &str, method: &str) -> bool;

    /// Called once the exchange has completed. Must not block.
    fn on_exchange(&self, exchange: Exchange);
}

// == Interceptor Chain ==
#[derive(Default, Clone)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn ExchangeInterceptor>>,
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, interceptor: Arc<dyn ExchangeInterceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Whether any registered interceptor wants the exchange.
    /// A panicking `wants` counts as "no".
    pub fn wants(&self, url: &str, method: &str) -> bool {
        self.interceptors.iter().any(|interceptor| {
            catch_unwind(AssertUnwindSafe(|| interceptor.wants(url, method))).unwrap_or(false)
        })
    }

    /// Hands `exchange` to every interceptor that wants it.
    ///
    /// Panics are caught and logged per interceptor. Returns how many
    /// interceptors received the exchange.
    pub fn dispatch(&self, exchange: &Exchange) -> usize {
        let mut delivered = 0;
        for interceptor in &self.interceptors {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                if interceptor.wants(&exchange.url, &exchange.method) {
                    interceptor.on_exchange(exchange.clone());
                    true
                } else {
                    false
                }
            }));
            match outcome {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(_) => warn!(url = %exchange.url, "Interceptor panicked; exchange unaffected"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl ExchangeInterceptor for Recorder {
        fn wants(&self, url: &str, _method: &str) -> bool {
            url.contains("/api/")
        }

        fn on_exchange(&self, exchange: Exchange) {
            self.seen.lock().unwrap().push(exchange.url);
        }
    }

    struct Exploding;

    impl ExchangeInterceptor for Exploding {
        fn wants(&self, _url: &str, _method: &str) -> bool {
            true
        }

        fn on_exchange(&self, _exchange: Exchange) {
            panic!("interceptor bug");
        }
    }

    #[test]
    fn test_dispatch_respects_wants() {
        let recorder = Arc::new(Recorder::default());
        let mut chain = InterceptorChain::new();
        chain.register(recorder.clone());

        assert_eq!(chain.dispatch(&Exchange::json("/api/a", "GET", json!(1))), 1);
        assert_eq!(chain.dispatch(&Exchange::json("/static/a", "GET", json!(1))), 0);
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["/api/a".to_string()]);
    }

    #[test]
    fn test_panicking_interceptor_is_isolated() {
        let recorder = Arc::new(Recorder::default());
        let mut chain = InterceptorChain::new();
        chain.register(Arc::new(Exploding));
        chain.register(recorder.clone());

        assert_eq!(chain.dispatch(&Exchange::json("/api/a", "GET", json!(1))), 1);
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_chain_wants() {
        let mut chain = InterceptorChain::new();
        assert!(chain.is_empty());
        assert!(!chain.wants("/api/a", "GET"));

        chain.register(Arc::new(Recorder::default()));
        assert_eq!(chain.len(), 1);
        assert!(chain.wants("/api/a", "GET"));
        assert!(!chain.wants("/other", "GET"));
    }

    #[test]
    fn test_exchange_builders() {
        let exchange = Exchange::json("/api/a", "POST", json!({}))
            .with_status(404)
            .with_content_type(None)
            .with_body(ExchangeBody::Failed("timeout".to_string()));

        assert!(!exchange.is_success());
        assert!(exchange.content_type.is_none());
        assert_eq!(exchange.body, ExchangeBody::Failed("timeout".to_string()));
    }
}
