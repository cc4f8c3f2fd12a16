//! Repository change watching for Vigil
//!
//! This crate observes repository state on disk and reports which repository
//! changed, with:
//! - Git-directory resolution (worktree and submodule `gitdir:` files)
//! - Noise filtering (object writes, reflogs, fsmonitor sockets)
//! - Per-path trailing-edge debouncing
//!
//! Notifications are delivered on an unbounded channel as the path that was
//! originally passed to [`PathWatcher::add`].

pub mod debounce;
pub mod error;
pub mod filter;
pub mod resolve;

pub use debounce::Debouncer;
pub use error::{Result, WatchError};
pub use filter::{EventFilter, BUILTIN_NOISE};
pub use resolve::resolve_watch_target;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Watcher configuration (the `[watch]` table of the config file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Watch repositories for changes
    pub enabled: bool,

    /// Quiet period before a burst of changes is reported
    pub debounce_ms: u64,

    /// Additional gitignore-style noise patterns, relative to the git dir
    pub ignore_patterns: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 300,
            ignore_patterns: Vec::new(),
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

type Entries = Mutex<HashMap<PathBuf, WatchEntry>>;

/// One observed path
struct WatchEntry {
    /// Directory actually handed to the OS watcher
    target: PathBuf,
    filter: EventFilter,
    /// Dropping the watcher releases the OS handle
    _watcher: RecommendedWatcher,
}

/// Watches a set of repository paths and reports debounced changes
///
/// Lock order: `entries` before the debouncer's timer table.
pub struct PathWatcher {
    config: WatchConfig,
    entries: Arc<Entries>,
    debouncer: Debouncer<PathBuf>,
}

impl PathWatcher {
    /// Create a watcher; must be called inside a tokio runtime.
    pub fn new(config: WatchConfig) -> Result<(Self, mpsc::UnboundedReceiver<PathBuf>)> {
        let (debouncer, changes) = Debouncer::new(config.debounce())?;
        let watcher = Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
            debouncer,
        };
        Ok((watcher, changes))
    }

    /// Start observing every path in `paths`, returning how many were added.
    pub fn watch<I, P>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .filter(|path| self.add(path.as_ref()))
            .count()
    }

    /// Start observing `path`.
    ///
    /// Returns `false` if the path is already observed or could not be set
    /// up; setup failures are logged and leave the path unobserved.
    pub fn add(&self, path: &Path) -> bool {
        let key = path.to_path_buf();
        if self.entries.lock().contains_key(&key) {
            trace!(path = %path.display(), "already watching");
            return false;
        }

        let entry = match self.prepare(&key) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "not watching path");
                return false;
            }
        };

        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            // Lost a race with a concurrent add; release ours outside the lock
            drop(entries);
            drop(entry);
            return false;
        }

        info!(path = %path.display(), target = %entry.target.display(), "watching");
        entries.insert(key, entry);
        true
    }

    /// Stop observing `path`, returning whether it was observed.
    ///
    /// A pending debounce timer for the path is cancelled, so no further
    /// notification is emitted for it.
    pub fn remove(&self, path: &Path) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            let removed = entries.remove(path);
            if removed.is_some() {
                self.debouncer.cancel(&path.to_path_buf());
            }
            removed
        };

        match removed {
            Some(entry) => {
                debug!(path = %path.display(), "stopped watching");
                drop(entry);
                true
            }
            None => false,
        }
    }

    /// Stop observing everything. Safe to call more than once.
    pub fn close(&self) {
        let drained: Vec<WatchEntry> = {
            let mut entries = self.entries.lock();
            self.debouncer.cancel_all();
            entries.drain().map(|(_, entry)| entry).collect()
        };

        if !drained.is_empty() {
            debug!(count = drained.len(), "closing watchers");
        }
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.entries.lock().contains_key(path)
    }

    /// Observed paths, sorted
    pub fn watched(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.entries.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Resolved directory being observed for `path`
    pub fn target(&self, path: &Path) -> Option<PathBuf> {
        self.entries.lock().get(path).map(|entry| entry.target.clone())
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Resolve, build the filter and register the OS watch for `key`.
    fn prepare(&self, key: &Path) -> Result<WatchEntry> {
        let target = resolve_watch_target(key)?;
        let filter = EventFilter::new(&target, &self.config.ignore_patterns)?;

        let entries: Weak<Entries> = Arc::downgrade(&self.entries);
        let debouncer = self.debouncer.clone();
        let owner = key.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(entries) = entries.upgrade() {
                    dispatch(&entries, &debouncer, &owner, &event);
                }
            }
            Err(err) => warn!(path = %owner.display(), error = %err, "watch error"),
        })
        .map_err(|source| WatchError::Notify {
            path: target.clone(),
            source,
        })?;

        watcher
            .watch(&target, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Notify {
                path: target.clone(),
                source,
            })?;

        Ok(WatchEntry {
            target,
            filter,
            _watcher: watcher,
        })
    }
}

impl Drop for PathWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Route one native event for `key` into the debouncer.
///
/// Returns whether the event bumped the key's timer.
fn dispatch(entries: &Entries, debouncer: &Debouncer<PathBuf>, key: &Path, event: &Event) -> bool {
    let entries = entries.lock();
    let Some(entry) = entries.get(key) else {
        return false;
    };

    if !entry.filter.is_relevant(event) {
        trace!(path = %key.display(), kind = ?event.kind, "ignoring noise");
        return false;
    }

    debouncer.bump(key.to_path_buf());
    true
}
