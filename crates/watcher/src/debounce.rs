//! Per-key trailing-edge debouncing
//!
//! Every `bump` restarts the key's timer, so a burst of bumps emits the key
//! exactly once, `delay` after the last bump. Keys are independent.

use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Per-key debouncer emitting settled keys on a channel
///
/// `bump` may be called from any thread, including the native watcher's
/// callback thread; timers run on the runtime captured at construction.
pub struct Debouncer<K> {
    delay: Duration,
    runtime: Handle,
    state: Arc<Mutex<TimerState<K>>>,
    output: mpsc::UnboundedSender<K>,
}

struct TimerState<K> {
    /// Shared across keys so a stale timer can never match a newer one
    next_generation: u64,
    timers: HashMap<K, Timer>,
}

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl<K> Clone for Debouncer<K> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            runtime: self.runtime.clone(),
            state: Arc::clone(&self.state),
            output: self.output.clone(),
        }
    }
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
{
    /// Create a debouncer on the current tokio runtime.
    pub fn new(delay: Duration) -> Result<(Self, mpsc::UnboundedReceiver<K>)> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_handle(delay, runtime))
    }

    /// Create a debouncer whose timers run on `runtime`.
    pub fn with_handle(delay: Duration, runtime: Handle) -> (Self, mpsc::UnboundedReceiver<K>) {
        let (output, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            runtime,
            state: Arc::new(Mutex::new(TimerState {
                next_generation: 0,
                timers: HashMap::new(),
            })),
            output,
        };
        (debouncer, rx)
    }

    /// (Re)start the timer for `key`.
    pub fn bump(&self, key: K) {
        let mut state = self.state.lock();

        if let Some(previous) = state.timers.remove(&key) {
            previous.handle.abort();
        }
        let generation = state.next_generation;
        state.next_generation += 1;

        let timers = Arc::clone(&self.state);
        let output = self.output.clone();
        let delay = self.delay;
        let fired = key.clone();

        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let mut state = timers.lock();
            let current = state
                .timers
                .get(&fired)
                .is_some_and(|timer| timer.generation == generation);
            if current {
                state.timers.remove(&fired);
                trace!(key = ?fired, "debounce window elapsed");
                let _ = output.send(fired);
            }
        });

        state.timers.insert(key, Timer { generation, handle });
    }

    /// Cancel the pending timer for `key`, returning whether one existed.
    pub fn cancel(&self, key: &K) -> bool {
        match self.state.lock().timers.remove(key) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer.
    pub fn cancel_all(&self) {
        let mut state = self.state.lock();
        for (_, timer) in state.timers.drain() {
            timer.handle.abort();
        }
    }

    /// Whether `key` has a timer waiting to fire
    pub fn pending(&self, key: &K) -> bool {
        self.state.lock().timers.contains_key(key)
    }

    /// Number of keys with a pending timer
    pub fn pending_count(&self) -> usize {
        self.state.lock().timers.len()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
