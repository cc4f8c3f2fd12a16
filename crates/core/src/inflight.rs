//! Single-flight deduplication of concurrent requests
//!
//! Concurrent callers asking for the same key share one underlying
//! execution. The entry for a key lives exactly as long as that execution is
//! pending; once it settles the entry is removed before any waiter sees the
//! outcome, so the next request for the key always starts fresh work.
//!
//! Each execution runs on its own task. Dropping every waiter does not stop
//! it, so it always settles and clears its entry.

use crate::defer::defer;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::trace;

type Pending<T> = Shared<BoxFuture<'static, T>>;

/// Collapses concurrent requests for the same key into one execution
///
/// The output is cloned to every waiter, so failures are shared too: every
/// coalesced caller sees the same `Err`.
pub struct InFlightDeduplicator<K, T> {
    inflight: Arc<DashMap<K, Pending<T>>>,
}

impl<K, T> Clone for InFlightDeduplicator<K, T> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<K, T> Default for InFlightDeduplicator<K, T>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

impl<K, T> fmt::Debug for InFlightDeduplicator<K, T>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightDeduplicator")
            .field("pending", &self.inflight.len())
            .finish()
    }
}

impl<K, T> InFlightDeduplicator<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` for `key`, or join the execution already pending for it.
    ///
    /// `fetch` is only invoked when no execution for `key` is pending.
    pub async fn run<F, Fut>(&self, key: K, fetch: F) -> T
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let pending = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                trace!(key = ?key, "joining in-flight request");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let inflight = Arc::clone(&self.inflight);
                let settled_key = key.clone();
                let handle = tokio::spawn(async move {
                    // Cleared on settlement, before the output reaches any waiter
                    let _settled = defer(move || {
                        inflight.remove(&settled_key);
                    });
                    fetch().await
                });
                let task = join_execution(handle).boxed().shared();

                trace!(key = ?key, "starting request");
                entry.insert(task.clone());
                task
            }
        };

        pending.await
    }

    /// Whether an execution for `key` is currently pending
    pub fn has(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }

    /// Number of pending executions
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

/// Wait for a spawned execution, re-raising its panic in the waiter.
async fn join_execution<T>(handle: JoinHandle<T>) -> T {
    match handle.await {
        Ok(value) => value,
        Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
        // Only the runtime shutting down cancels the task, and it drops
        // every waiter with it
        Err(_) => future::pending().await,
    }
}
