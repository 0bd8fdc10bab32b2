//! API Routes
//!
//! Configures the Axum router with all endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    capture_handler, clear_handler, health_handler, keys_handler, protocol_handler,
    record_handler, scope_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /protocol` - Introspection protocol message
/// - `POST /capture` - Report a completed exchange
/// - `POST /scope` - Report a scope change
/// - `GET /records?key=` - Fetch one record by key
/// - `GET /records/keys` - List live keys
/// - `DELETE /records` - Clear the cache
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check
pub fn create_router(state: AppState) -> Router {
    // Peers connect from page origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/protocol", post(protocol_handler))
        .route("/capture", post(capture_handler))
        .route("/scope", post(scope_handler))
        .route("/records", get(record_handler).delete(clear_handler))
        .route("/records/keys", get(keys_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
