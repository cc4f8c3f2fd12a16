//! Fetch coordination for the vigil dashboard
//!
//! This crate provides the primitives every data source goes through:
//! - Bounded concurrency with a FIFO wait queue ([`ConcurrencyPool`])
//! - Debounced, latest-wins request scheduling ([`FetchScheduler`])
//! - Single-flight deduplication of concurrent requests ([`InFlightDeduplicator`])
//! - Short-lived memoization with lazy expiry ([`TtlCache`])
//! - A composed cache + single-flight + pool handle ([`CachedSource`])
//!
//! All shared state is guarded and never held across an `.await`, so every
//! handle can be cloned into spawned tasks on a multi-threaded runtime.

pub mod defer;
pub mod inflight;
pub mod pool;
pub mod scheduler;
pub mod source;
pub mod ttl;

// Re-exports
pub use defer::{defer, DeferGuard};
pub use inflight::InFlightDeduplicator;
pub use pool::ConcurrencyPool;
pub use scheduler::{Delivery, FetchScheduler};
pub use source::CachedSource;
pub use ttl::TtlCache;
