//! Latest-wins request scheduling for one reactive subject
//!
//! A [`FetchScheduler`] owns a monotonically increasing request epoch. Every
//! `trigger`, `immediate` and `cancel` bumps it, and a completed fetch is only
//! delivered if its epoch is still the current one. Older fetches that finish
//! late are dropped, so the receiver only ever sees the freshest answer.
//!
//! Cancellation is cooperative: a fetch that already started keeps running
//! and its result is discarded. Only `dispose` abandons in-flight fetches.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A fetch result that was still current when it completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<T> {
    /// Epoch of the request that produced this value
    pub request_id: u64,
    /// Output of the fetch
    pub value: T,
}

/// Debounced, latest-wins scheduler
///
/// Results arrive on the receiver returned by [`FetchScheduler::new`].
/// Dropping the scheduler disposes it.
pub struct FetchScheduler<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    state: Mutex<SchedulerState>,
    results: mpsc::UnboundedSender<Delivery<T>>,
    /// Flipped to `true` on dispose; in-flight fetches watch it
    shutdown: watch::Sender<bool>,
}

struct SchedulerState {
    epoch: u64,
    /// Pending debounce timer, if any
    timer: Option<JoinHandle<()>>,
    disposed: bool,
}

impl SchedulerState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl<T: Send + 'static> FetchScheduler<T> {
    /// Create a scheduler and the receiver its results are delivered on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivery<T>>) {
        let (results, rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let scheduler = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState {
                    epoch: 0,
                    timer: None,
                    disposed: false,
                }),
                results,
                shutdown,
            }),
        };
        (scheduler, rx)
    }

    /// Start `fetch` after `delay`, superseding every earlier request.
    ///
    /// Calling again within `delay` restarts the wait, so a burst of triggers
    /// runs only the last one. Returns the new request id.
    pub fn trigger<F, Fut>(&self, delay: Duration, fetch: F) -> u64
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.disposed {
            return state.epoch;
        }

        state.cancel_timer();
        state.epoch += 1;
        let id = state.epoch;

        let shared = Arc::clone(&self.shared);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !shared.is_current(id) {
                trace!(request_id = id, "debounced request superseded before start");
                return;
            }
            shared.start(id, fetch);
        }));

        trace!(request_id = id, delay_ms = delay.as_millis() as u64, "fetch scheduled");
        id
    }

    /// Start `fetch` now, superseding every earlier request.
    ///
    /// Any pending debounce timer is cancelled. Returns the new request id.
    pub fn immediate<F, Fut>(&self, fetch: F) -> u64
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let id = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return state.epoch;
            }
            state.cancel_timer();
            state.epoch += 1;
            state.epoch
        };

        self.shared.start(id, fetch);
        id
    }

    /// Invalidate every outstanding request.
    ///
    /// A pending timer never fires and started fetches are not delivered.
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        state.cancel_timer();
        state.epoch += 1;
        trace!(request_id = state.epoch, "requests cancelled");
    }

    /// Stop the scheduler permanently.
    ///
    /// Timers are cleared, in-flight fetches are abandoned, and no further
    /// results are delivered. Later triggers are ignored.
    pub fn dispose(&self) {
        if self.shared.dispose() {
            debug!("fetch scheduler disposed");
        }
    }

    /// Current request epoch
    pub fn request_id(&self) -> u64 {
        self.shared.state.lock().epoch
    }

    /// Whether `dispose` has been called
    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    /// Whether a debounce timer is waiting to fire
    pub fn has_pending_timer(&self) -> bool {
        self.shared
            .state
            .lock()
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl<T> Shared<T> {
    /// Returns `false` if already disposed.
    fn dispose(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.disposed {
                return false;
            }
            state.cancel_timer();
            state.epoch += 1;
            state.disposed = true;
        }
        self.shutdown.send_replace(true);
        true
    }

    fn is_current(&self, id: u64) -> bool {
        let state = self.state.lock();
        !state.disposed && state.epoch == id
    }
}

impl<T> Shared<T>
where
    T: Send + 'static,
{
    /// Run `fetch` on its own task and deliver the output if still current.
    fn start<F, Fut>(self: &Arc<Self>, id: u64, fetch: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let value = tokio::select! {
                biased;
                _ = async { let _ = shutdown.wait_for(|disposed| *disposed).await; } => {
                    trace!(request_id = id, "in-flight fetch abandoned");
                    return;
                }
                value = fetch() => value,
            };
            shared.deliver(id, value);
        });
    }

    /// Freshness check and delivery happen under the same lock.
    fn deliver(&self, id: u64, value: T) {
        let state = self.state.lock();
        if state.disposed || state.epoch != id {
            debug!(request_id = id, current = state.epoch, "dropping stale fetch result");
            return;
        }
        if self.results.send(Delivery { request_id: id, value }).is_err() {
            trace!(request_id = id, "result receiver gone");
        }
    }
}

impl<T> Drop for FetchScheduler<T> {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}
