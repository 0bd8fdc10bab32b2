//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cleanup: sweeps expired records and stale dedup entries at the
//!   configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
