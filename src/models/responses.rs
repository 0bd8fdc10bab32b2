//! Response DTOs
//!
//! Outgoing protocol messages and HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheRecord, CacheStats};

/// One entry of an `available_data` listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub key: String,
    /// `"<method> <sourceUrl>"`
    pub description: String,
    pub size: usize,
    pub scope: String,
    /// Write time, Unix milliseconds
    pub timestamp: u64,
}

impl From<&CacheRecord> for DataSummary {
    fn from(record: &CacheRecord) -> Self {
        Self {
            key: record.key.clone(),
            description: record.description(),
            size: record.size_bytes,
            scope: record.scope.clone(),
            timestamp: record.created_at,
        }
    }
}

/// Machine-readable failure carried inside protocol responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Introspection protocol response, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolResponse {
    Pong {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    AvailableData {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        data: Vec<DataSummary>,
    },
    ApiResult {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        success: bool,
        #[serde(rename = "isLargeData", skip_serializing_if = "Option::is_none")]
        is_large_data: Option<bool>,
        #[serde(rename = "cacheKey", skip_serializing_if = "Option::is_none")]
        cache_key: Option<String>,
        /// `Some(Value::Null)` serializes as an explicit `null`
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorDetail>,
    },
    CodeResult {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        success: bool,
        error: ErrorDetail,
    },
}

impl ProtocolResponse {
    /// Payload delivered inline.
    pub fn api_inline(request_id: Option<String>, payload: Value) -> Self {
        ProtocolResponse::ApiResult {
            request_id,
            success: true,
            is_large_data: None,
            cache_key: None,
            data: Some(payload),
            error: None,
        }
    }

    /// Payload too large to inline; the peer fetches it by `cache_key`.
    pub fn api_by_reference(request_id: Option<String>, cache_key: String) -> Self {
        ProtocolResponse::ApiResult {
            request_id,
            success: true,
            is_large_data: Some(true),
            cache_key: Some(cache_key),
            data: Some(Value::Null),
            error: None,
        }
    }

    pub fn api_error(request_id: Option<String>, error: ErrorDetail) -> Self {
        ProtocolResponse::ApiResult {
            request_id,
            success: false,
            is_large_data: None,
            cache_key: None,
            data: None,
            error: Some(error),
        }
    }

    /// Wire name of the response, as reported in `CallbackSent` events.
    pub fn type_name(&self) -> &'static str {
        match self {
            ProtocolResponse::Pong { .. } => "pong",
            ProtocolResponse::AvailableData { .. } => "available_data",
            ProtocolResponse::ApiResult { .. } => "api_result",
            ProtocolResponse::CodeResult { .. } => "code_result",
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Mean background capture duration in milliseconds
    pub avg_capture_ms: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        let avg_capture_ms = stats.avg_capture_ms();
        Self {
            stats,
            hit_rate,
            avg_capture_ms,
        }
    }
}

/// Response body for POST /capture
#[derive(Debug, Clone, Serialize)]
pub struct CaptureResponse {
    /// Whether the exchange passed the filter and a write was scheduled
    pub scheduled: bool,
}

/// Response body for POST /scope
#[derive(Debug, Clone, Serialize)]
pub struct ScopeResponse {
    pub previous: String,
    pub current: String,
    /// Whether a purge of the previous scope was scheduled
    pub purge_scheduled: bool,
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
