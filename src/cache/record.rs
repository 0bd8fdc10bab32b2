//! Cache Record Module
//!
//! Defines the unit of storage and its provenance metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// == Record Meta ==
/// Provenance of a captured exchange, supplied by the writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    /// Full URL the payload was fetched from
    pub source_url: String,
    /// HTTP method of the exchange
    pub method: String,
    /// HTTP status of the response
    pub status_code: u16,
    /// Logical scope active when the exchange completed
    pub scope: String,
}

impl RecordMeta {
    /// Creates metadata for a GET with status 200, the common case.
    pub fn new(source_url: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            method: "GET".to_string(),
            status_code: 200,
            scope: scope.into(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }
}

// == Cache Record ==
/// A stored response payload with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Canonical key (path plus query of the source URL)
    pub key: String,
    /// Decoded response body
    pub payload: Value,
    pub source_url: String,
    pub method: String,
    pub status_code: u16,
    pub scope: String,
    /// Canonical serialized size of `payload`
    pub size_bytes: usize,
    /// Write timestamp (Unix milliseconds)
    pub created_at: u64,
}

impl CacheRecord {
    // == Constructor ==
    /// Builds a record from an already-measured payload.
    pub fn new(
        key: String,
        payload: Value,
        meta: RecordMeta,
        size_bytes: usize,
        created_at: u64,
    ) -> Self {
        Self {
            key,
            payload,
            source_url: meta.source_url,
            method: meta.method,
            status_code: meta.status_code,
            scope: meta.scope,
            size_bytes,
            created_at,
        }
    }

    // == Is Expired ==
    /// A record is expired once strictly more than `ttl_ms` has elapsed
    /// since it was written.
    pub fn is_expired(&self, ttl_ms: u64, now_ms: u64) -> bool {
        is_expired_at(self.created_at, ttl_ms, now_ms)
    }

    /// `"<method> <sourceUrl>"`, as listed to introspection peers.
    pub fn description(&self) -> String {
        format!("{} {}", self.method, self.source_url)
    }
}

/// Expiry test on a bare write timestamp, for listings that carry no
/// payload.
pub fn is_expired_at(created_at: u64, ttl_ms: u64, now_ms: u64) -> bool {
    now_ms.saturating_sub(created_at) > ttl_ms
}

// == Canonical Size ==
/// Byte length of the canonical JSON serialization of `payload`.
///
/// `serde_json` maps keep their keys sorted, so the result does not depend
/// on the field order the payload arrived with.
pub fn canonical_size(payload: &Value) -> Result<usize> {
    Ok(serde_json::to_vec(payload)?.len())
}
