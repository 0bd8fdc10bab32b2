//! API Handlers
//!
//! HTTP request handlers for each endpoint. All cache access goes through
//! the fail-open engine, so only request validation and by-reference misses
//! produce error responses.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use crate::api::protocol::ProtocolHandler;
use crate::cache::{CacheEngine, CacheRecord, MemoryStore};
use crate::capture::{CaptureAdapter, CaptureFilter, Exchange};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    CaptureRequest, CaptureResponse, HealthResponse, ProtocolRequest, ProtocolResponse,
    RecordQuery, ScopeChangeRequest, ScopeResponse, StatsResponse,
};
use crate::scope::ScopeTracker;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CacheEngine>,
    pub scope: Arc<ScopeTracker>,
    pub adapter: Arc<CaptureAdapter>,
    pub protocol: Arc<ProtocolHandler>,
}

impl AppState {
    /// Wires tracker, adapter and protocol handler around `engine`.
    pub fn new(
        engine: Arc<CacheEngine>,
        filter: CaptureFilter,
        initial_scope: &str,
        large_data_threshold_bytes: usize,
    ) -> Self {
        let scope = Arc::new(ScopeTracker::new(Arc::clone(&engine), initial_scope));
        let adapter = Arc::new(CaptureAdapter::new(
            Arc::new(filter),
            Arc::clone(&engine),
            Arc::clone(&scope),
        ));
        let protocol = Arc::new(ProtocolHandler::new(
            Arc::clone(&engine),
            large_data_threshold_bytes,
        ));
        Self {
            engine,
            scope,
            adapter,
            protocol,
        }
    }

    /// Builds the in-memory engine and every collaborator from configuration.
    ///
    /// Fails only if the capture filter rejects the base origin.
    pub fn from_config(config: &Config) -> Result<Self> {
        let engine = Arc::new(CacheEngine::new(MemoryStore::new(), config.policy()));
        let filter = CaptureFilter::new(config.filter())?;
        Ok(Self::new(
            engine,
            filter,
            &config.initial_scope,
            config.large_data_threshold_bytes,
        ))
    }
}

/// Handler for POST /protocol
pub async fn protocol_handler(
    State(state): State<AppState>,
    Json(req): Json<ProtocolRequest>,
) -> Json<ProtocolResponse> {
    Json(state.protocol.handle(req).await)
}

/// Handler for POST /capture
///
/// Always answers 202; the write, if any, completes in the background.
pub async fn capture_handler(
    State(state): State<AppState>,
    Json(req): Json<CaptureRequest>,
) -> (StatusCode, Json<CaptureResponse>) {
    let scheduled = state.adapter.capture(Exchange::from(req)).is_some();
    (StatusCode::ACCEPTED, Json(CaptureResponse { scheduled }))
}

/// Handler for POST /scope
pub async fn scope_handler(
    State(state): State<AppState>,
    Json(req): Json<ScopeChangeRequest>,
) -> Result<Json<ScopeResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let (previous, purge_scheduled) = match state.scope.on_scope_change(&req.scope) {
        Some(change) => (change.previous, change.purge.is_some()),
        None => (req.scope.clone(), false),
    };
    debug!(previous = %previous, current = %req.scope, purge_scheduled, "Scope request handled");

    Ok(Json(ScopeResponse {
        previous,
        current: req.scope,
        purge_scheduled,
    }))
}

/// Handler for GET /records?key=
///
/// By-reference fetch of a record announced as large data.
pub async fn record_handler(
    State(state): State<AppState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<CacheRecord>> {
    let record = state.protocol.record(&query.key).await?;
    Ok(Json(record))
}

/// Handler for GET /records/keys
pub async fn keys_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.get_all_keys().await)
}

/// Handler for DELETE /records
pub async fn clear_handler(State(state): State<AppState>) -> StatusCode {
    state.engine.clear().await;
    StatusCode::NO_CONTENT
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.engine.stats().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RecordMeta;
    use serde_json::json;

    fn test_state() -> AppState {
        AppState::from_config(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_capture_then_fetch_by_reference() {
        let state = test_state();
        let req: CaptureRequest = serde_json::from_value(json!({
            "url": "https://app.example/api/report?year=2024",
            "contentType": "application/json",
            "payload": { "rows": [1, 2, 3] }
        }))
        .unwrap();

        let (status, Json(resp)) = capture_handler(State(state.clone()), Json(req)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(resp.scheduled);

        for _ in 0..100 {
            if state.engine.count().await == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }

        let Json(record) = record_handler(
            State(state),
            Query(RecordQuery {
                key: "/api/report?year=2024".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(record.payload, json!({ "rows": [1, 2, 3] }));
    }

    #[tokio::test]
    async fn test_capture_not_scheduled_for_excluded_url() {
        let state = test_state();
        let req: CaptureRequest = serde_json::from_value(json!({
            "url": "/api/auth/session",
            "contentType": "application/json",
            "payload": {}
        }))
        .unwrap();

        let (status, Json(resp)) = capture_handler(State(state), Json(req)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(!resp.scheduled);
    }

    #[tokio::test]
    async fn test_record_handler_not_found() {
        let state = test_state();
        let result = record_handler(
            State(state),
            Query(RecordQuery {
                key: "/api/missing".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_scope_handler() {
        let state = test_state();
        state
            .engine
            .put("/api/a", json!(1), RecordMeta::new("/api/a", "/"))
            .await
            .unwrap();

        let Json(resp) = scope_handler(
            State(state.clone()),
            Json(ScopeChangeRequest {
                scope: "/orders".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.previous, "/");
        assert_eq!(resp.current, "/orders");
        assert!(resp.purge_scheduled);
    }

    #[tokio::test]
    async fn test_scope_handler_same_scope() {
        let state = test_state();
        let Json(resp) = scope_handler(
            State(state),
            Json(ScopeChangeRequest {
                scope: "/".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.previous, "/");
        assert_eq!(resp.current, "/");
        assert!(!resp.purge_scheduled);
    }

    #[tokio::test]
    async fn test_scope_handler_invalid_request() {
        let state = test_state();
        let result = scope_handler(
            State(state),
            Json(ScopeChangeRequest {
                scope: "".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_keys_and_clear() {
        let state = test_state();
        state
            .engine
            .put("/api/a", json!(1), RecordMeta::new("/api/a", "/"))
            .await
            .unwrap();

        let Json(keys) = keys_handler(State(state.clone())).await;
        assert_eq!(keys, vec!["/api/a".to_string()]);

        assert_eq!(clear_handler(State(state.clone())).await, StatusCode::NO_CONTENT);
        let Json(keys) = keys_handler(State(state)).await;
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        let Json(response) = stats_handler(State(state)).await;
        assert_eq!(response.stats.hits, 0);
        assert_eq!(response.stats.total_entries, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
