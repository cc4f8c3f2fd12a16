//! Workflow integration tests
//!
//! Tests for complete fetch workflows across the session, the scheduler and
//! the concurrency pool.

pub mod dashboard;
pub mod snapshot;
