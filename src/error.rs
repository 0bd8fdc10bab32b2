//! Error types for the capture cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the capture cache.
///
/// The cache engine never hands these to its callers; they travel between
/// the store backend and the engine, and out of the HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache (absent or expired)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The record store cannot be reached
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Payload could not be canonically serialized
    #[error("Serialization failure: {0}")]
    Serialization(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// Stable machine-readable code, as used by the introspection protocol.
    pub fn code(&self) -> &'static str {
        match self {
            CacheError::NotFound(_) => "NOT_FOUND",
            CacheError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            CacheError::Serialization(_) => "SERIALIZATION_FAILURE",
            CacheError::InvalidRequest(_) => "INVALID_REQUEST",
            CacheError::Config(_) => "INVALID_CONFIG",
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the capture cache.
pub type Result<T> = std::result::Result<T, CacheError>;
