//! Request and Response models
//!
//! DTOs for the introspection protocol and the HTTP surface.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{CaptureRequest, ProtocolRequest, RecordQuery, ScopeChangeRequest};
pub use responses::{
    CaptureResponse, DataSummary, ErrorDetail, HealthResponse, ProtocolResponse, ScopeResponse,
    StatsResponse,
};
