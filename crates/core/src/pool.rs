//! Bounded concurrency for expensive async work
//!
//! At most `concurrency` tasks run at once. Callers arriving while every slot
//! is taken wait in a FIFO queue; when a running task settles its slot is
//! handed straight to the head of the queue, so `active_count` never dips
//! between one task finishing and the next one starting.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::trace;

/// Concurrency limiter with a strict FIFO wait queue
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Clone)]
pub struct ConcurrencyPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    /// Maximum number of simultaneously running tasks (always >= 1)
    concurrency: usize,
    state: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    /// Tasks currently holding a slot
    active: usize,
    /// Callers waiting for a slot, oldest first
    queue: VecDeque<Waiter>,
    /// Ticket counter used to find a waiter again on cancellation
    next_ticket: u64,
}

struct Waiter {
    ticket: u64,
    wake: oneshot::Sender<()>,
}

impl PoolState {
    /// Give up one slot: hand it to the oldest live waiter, or free it.
    fn release(&mut self) {
        while let Some(waiter) = self.queue.pop_front() {
            if waiter.wake.send(()).is_ok() {
                trace!(ticket = waiter.ticket, "slot handed to queued task");
                return;
            }
        }
        self.active -= 1;
    }
}

impl ConcurrencyPool {
    /// Create a pool running at most `concurrency` tasks at once.
    ///
    /// A limit of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                concurrency: concurrency.max(1),
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Run `task` once a slot is available and return its output.
    ///
    /// The slot is released when the task settles, whatever its outcome.
    /// A failing task only affects its own caller. Dropping the returned
    /// future while it is still queued removes it from the queue.
    pub async fn run<F, Fut>(&self, task: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _slot = self.acquire().await;
        task().await
    }

    /// Number of tasks currently holding a slot
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Number of callers waiting for a slot
    pub fn queue_length(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Configured concurrency limit
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    async fn acquire(&self) -> Slot {
        let mut pending = {
            let mut state = self.inner.state.lock();
            if state.active < self.inner.concurrency {
                state.active += 1;
                return Slot {
                    pool: Arc::clone(&self.inner),
                };
            }

            let ticket = state.next_ticket;
            state.next_ticket += 1;
            let (wake, granted) = oneshot::channel();
            state.queue.push_back(Waiter { ticket, wake });
            trace!(ticket, queued = state.queue.len(), "pool full, task queued");

            Pending {
                pool: Arc::clone(&self.inner),
                ticket,
                granted,
                done: false,
            }
        };

        // The sender is only consumed by `release`, which sends before dropping it
        let _ = (&mut pending.granted).await;
        pending.into_slot()
    }
}

/// A held slot; releasing happens on drop
struct Slot {
    pool: Arc<PoolInner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.pool.state.lock().release();
    }
}

/// A queued caller that has not yet taken up its slot
struct Pending {
    pool: Arc<PoolInner>,
    ticket: u64,
    granted: oneshot::Receiver<()>,
    done: bool,
}

impl Pending {
    fn into_slot(mut self) -> Slot {
        self.done = true;
        Slot {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        // Dropped before taking up the slot. Either still queued, or a slot
        // was already handed over and has to be passed on.
        let mut state = self.pool.state.lock();
        if let Some(pos) = state.queue.iter().position(|w| w.ticket == self.ticket) {
            state.queue.remove(pos);
            trace!(ticket = self.ticket, "queued task cancelled");
        } else {
            state.release();
        }
    }
}
