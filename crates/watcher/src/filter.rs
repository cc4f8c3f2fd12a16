//! Noise filtering for low-level watch events
//!
//! A git directory sees a lot of churn that says nothing about repository
//! state (object writes, reflog appends, fsmonitor sockets). Events whose
//! paths are all noise never reach the debouncer.
//!
//! Patterns use gitignore syntax and are relative to the watch target.

use crate::error::Result;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Event, EventKind};
use std::path::{Path, PathBuf};

/// Patterns that are always treated as noise
///
/// Lock files are deliberately absent: `index.lock` accompanies staging.
pub const BUILTIN_NOISE: &[&str] = &["objects/", "logs/", "fsmonitor--daemon/"];

/// Decides which events for one watch target are worth a notification
#[derive(Debug, Clone)]
pub struct EventFilter {
    root: PathBuf,
    noise: Gitignore,
}

impl EventFilter {
    /// Build a filter for `root` from the built-in patterns plus `extra`.
    pub fn new(root: &Path, extra: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in BUILTIN_NOISE {
            builder.add_line(None, pattern)?;
        }
        for pattern in extra {
            builder.add_line(None, pattern)?;
        }

        Ok(Self {
            root: root.to_path_buf(),
            noise: builder.build()?,
        })
    }

    /// Whether `event` should bump the path's debounce timer
    pub fn is_relevant(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }

        // Rescans and overflow notices carry no paths
        if event.paths.is_empty() {
            return true;
        }

        event.paths.iter().any(|path| !self.is_noise(path))
    }

    /// Whether a single path matches a noise pattern
    pub fn is_noise(&self, path: &Path) -> bool {
        let relative = match path.strip_prefix(&self.root) {
            Ok(relative) => relative,
            Err(_) if path.is_relative() => path,
            Err(_) => return false,
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        self.noise
            .matched_path_or_any_parents(relative, path.is_dir())
            .is_ignore()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
