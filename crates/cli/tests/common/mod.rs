//! Common utilities for integration tests

pub mod fakes;

// Re-export commonly used items
pub use fakes::{FakeReviews, FakeStatus};
