//! API Module
//!
//! The introspection protocol and the HTTP surface in front of the cache.
//!
//! # Endpoints
//! - `POST /protocol` - Introspection protocol message
//! - `POST /capture` - Report a completed exchange
//! - `POST /scope` - Report a scope change
//! - `GET /records?key=` - Fetch one record by key
//! - `GET /records/keys` - List live keys
//! - `DELETE /records` - Clear the cache
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod protocol;
pub mod routes;

pub use handlers::*;
pub use protocol::{ProtocolHandler, LARGE_DATA_THRESHOLD_BYTES};
pub use routes::create_router;
