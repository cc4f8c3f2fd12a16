//! Repository data collectors for Vigil
//!
//! Each collector shells out to an external tool and reduces its output to a
//! small, cloneable value. Collectors know nothing about caching or
//! scheduling; `vigil-core` wraps them.

pub mod error;
pub mod git;
pub mod process;
pub mod review;

pub use error::{CollectError, Result};
pub use git::{GitStatusCollector, RepoStatus};
pub use process::run_command;
pub use review::{parse_pull_requests, PullRequest, ReviewCollector, ReviewDecision};

use async_trait::async_trait;
use std::path::Path;

/// A source of per-repository data
#[async_trait]
pub trait Collector: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Label for logs
    fn name(&self) -> &'static str;

    /// Gather this collector's data for `repo`.
    async fn collect(&self, repo: &Path) -> Result<Self::Output>;
}
