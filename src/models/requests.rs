//! Request DTOs
//!
//! Incoming protocol messages and HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::capture::{Exchange, ExchangeBody};

/// Introspection protocol request, tagged by `type`.
///
/// `requestId` is optional on the wire and echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolRequest {
    Ping {
        #[serde(rename = "requestId", default)]
        request_id: Option<String>,
    },
    RequestAvailableData {
        #[serde(rename = "requestId", default)]
        request_id: Option<String>,
    },
    RequestApi {
        #[serde(rename = "requestId", default)]
        request_id: Option<String>,
        #[serde(rename = "dataKey")]
        data_key: String,
    },
    ExecuteCode {
        #[serde(rename = "requestId", default)]
        request_id: Option<String>,
        #[serde(default)]
        code: String,
    },
}

impl ProtocolRequest {
    /// Correlation id of the request, if it carried one.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ProtocolRequest::Ping { request_id }
            | ProtocolRequest::RequestAvailableData { request_id }
            | ProtocolRequest::RequestApi { request_id, .. }
            | ProtocolRequest::ExecuteCode { request_id, .. } => request_id.as_deref(),
        }
    }
}

/// Request body for POST /capture: a completed exchange seen by the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Decoded response body; absent when the response had none
    #[serde(default)]
    pub payload: Option<Value>,
    /// Transport error; when set the payload is ignored
    #[serde(default)]
    pub error: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

impl From<CaptureRequest> for Exchange {
    fn from(req: CaptureRequest) -> Self {
        let body = match (req.error, req.payload) {
            (Some(error), _) => ExchangeBody::Failed(error),
            (None, Some(payload)) => ExchangeBody::Json(payload),
            (None, None) => ExchangeBody::Empty,
        };
        Exchange {
            url: req.url,
            method: req.method,
            status: req.status,
            content_type: req.content_type,
            body,
        }
    }
}

/// Request body for POST /scope.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeChangeRequest {
    pub scope: String,
}

impl ScopeChangeRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.scope.trim().is_empty() {
            return Some("Scope cannot be empty".to_string());
        }
        None
    }
}

/// Query string of GET /records.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordQuery {
    pub key: String,
}
