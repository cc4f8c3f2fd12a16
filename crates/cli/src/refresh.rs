//! Periodic refresh ticker
//!
//! Catches changes the watcher cannot see (new commits on the remote, pull
//! request activity) by asking the dashboard to refresh everything on a fixed
//! interval.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// One periodic refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTick {
    /// 1 for the first tick after startup
    pub sequence: u64,
}

/// Sends a [`RefreshTick`] every `interval`
pub struct PeriodicRefresher {
    interval: Duration,
    tick_tx: mpsc::Sender<RefreshTick>,
}

impl PeriodicRefresher {
    pub fn new(interval: Duration, tick_tx: mpsc::Sender<RefreshTick>) -> Self {
        Self { interval, tick_tx }
    }

    /// Run until the receiver goes away.
    ///
    /// The first tick fires one full interval after start; the initial
    /// snapshot is the caller's job. A zero interval returns immediately.
    pub async fn run(self) {
        if self.interval.is_zero() {
            debug!("periodic refresh disabled");
            return;
        }

        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Starting periodic refresh (interval: {:?})", self.interval);

        let mut sequence = 0;
        loop {
            timer.tick().await;
            sequence += 1;

            if self.tick_tx.send(RefreshTick { sequence }).await.is_err() {
                debug!("refresh receiver closed, stopping");
                return;
            }
        }
    }
}
