//! Introspection Protocol
//!
//! Transport-independent handling of peer requests. Every request gets an
//! answer carrying the request's `requestId`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheEngine, CacheRecord, MemoryStore, RecordStore};
use crate::error::{CacheError, Result};
use crate::events::CacheEvent;
use crate::models::{DataSummary, ErrorDetail, ProtocolRequest, ProtocolResponse};

/// Default size at or above which `request_api` answers by reference.
pub const LARGE_DATA_THRESHOLD_BYTES: usize = 100 * 1024;

pub struct ProtocolHandler<S = MemoryStore> {
    engine: Arc<CacheEngine<S>>,
    large_data_threshold_bytes: usize,
}

impl<S: RecordStore> ProtocolHandler<S> {
    pub fn new(engine: Arc<CacheEngine<S>>, large_data_threshold_bytes: usize) -> Self {
        Self {
            engine,
            large_data_threshold_bytes,
        }
    }

    // == Handle ==
    pub async fn handle(&self, request: ProtocolRequest) -> ProtocolResponse {
        let request_id = request.request_id().map(str::to_string);
        let response = match request {
            ProtocolRequest::Ping { request_id } => {
                return ProtocolResponse::Pong { request_id };
            }
            ProtocolRequest::RequestAvailableData { request_id } => {
                self.available_data(request_id).await
            }
            ProtocolRequest::RequestApi {
                request_id,
                data_key,
            } => self.api(request_id, &data_key).await,
            ProtocolRequest::ExecuteCode { request_id, code } => {
                warn!(
                    code_len = code.len(),
                    "Rejected execute_code request; code execution is not supported"
                );
                ProtocolResponse::CodeResult {
                    request_id,
                    success: false,
                    error: ErrorDetail::new(
                        "UNSUPPORTED",
                        "Code execution against the cache is not supported",
                    ),
                }
            }
        };

        self.engine.events().publish(&CacheEvent::CallbackSent {
            callback: response.type_name().to_string(),
            request_id,
        });
        response
    }

    async fn available_data(&self, request_id: Option<String>) -> ProtocolResponse {
        let data: Vec<DataSummary> = self
            .engine
            .get_all()
            .await
            .iter()
            .map(DataSummary::from)
            .collect();
        debug!(count = data.len(), "Answering available_data");
        ProtocolResponse::AvailableData { request_id, data }
    }

    async fn api(&self, request_id: Option<String>, data_key: &str) -> ProtocolResponse {
        match self.record(data_key).await {
            Ok(record) if record.size_bytes >= self.large_data_threshold_bytes => {
                debug!(key = data_key, size = record.size_bytes, "Answering by reference");
                ProtocolResponse::api_by_reference(request_id, record.key)
            }
            Ok(record) => ProtocolResponse::api_inline(request_id, record.payload),
            Err(e) => {
                ProtocolResponse::api_error(request_id, ErrorDetail::new(e.code(), e.to_string()))
            }
        }
    }

    /// Live record for `key`, used for by-reference fetches.
    pub async fn record(&self, key: &str) -> Result<CacheRecord> {
        self.engine
            .get(key)
            .await
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }
}

impl<S> std::fmt::Debug for ProtocolHandler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolHandler")
            .field("large_data_threshold_bytes", &self.large_data_threshold_bytes)
            .finish()
    }
}
