//! Watcher error types

use std::path::PathBuf;
use thiserror::Error;

/// Failure to set up observation for one path
///
/// These never escape [`PathWatcher::add`](crate::PathWatcher::add), which
/// logs them and leaves the path unobserved.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The path to watch does not exist
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),

    /// The path (or the target of its indirection file) could not be read
    #[error("failed to resolve {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `.git` file that does not contain a `gitdir:` line
    #[error("malformed gitdir file: {0}")]
    BadGitFile(PathBuf),

    /// The native watch facility rejected the target
    #[error("failed to watch {path}: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A noise pattern could not be compiled
    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] ignore::Error),

    /// Debounce timers need a tokio runtime
    #[error("watcher must be created inside a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;
