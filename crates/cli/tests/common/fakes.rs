//! Scripted collectors

use async_trait::async_trait;
use collect::{CollectError, Collector, PullRequest, RepoStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Status collector with a fixed latency and per-repo answers
///
/// Repositories without an answer fail with `CommandFailed`.
#[derive(Clone, Default)]
pub struct FakeStatus {
    pub latency: Duration,
    answers: Arc<Mutex<HashMap<PathBuf, RepoStatus>>>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FakeStatus {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    pub fn answer(&self, repo: &Path, branch: &str) {
        let status = RepoStatus {
            branch: Some(branch.to_string()),
            ..Default::default()
        };
        self.answers.lock().insert(repo.to_path_buf(), status);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, repo: &Path) -> usize {
        self.calls.lock().iter().filter(|p| *p == repo).count()
    }

    /// Most collections observed running at the same time
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for FakeStatus {
    type Output = RepoStatus;

    fn name(&self) -> &'static str {
        "fake-status"
    }

    async fn collect(&self, repo: &Path) -> Result<RepoStatus, CollectError> {
        self.calls.lock().push(repo.to_path_buf());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.answers
            .lock()
            .get(repo)
            .cloned()
            .ok_or_else(|| CollectError::CommandFailed {
                command: "git status".into(),
                code: Some(128),
                stderr: "not a git repository".into(),
            })
    }
}

/// Review collector returning one pull request named after the repository
#[derive(Clone, Default)]
pub struct FakeReviews {
    pub latency: Duration,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeReviews {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Collector for FakeReviews {
    type Output = Vec<PullRequest>;

    fn name(&self) -> &'static str {
        "fake-reviews"
    }

    async fn collect(&self, repo: &Path) -> Result<Vec<PullRequest>, CollectError> {
        self.calls.lock().push(repo.to_path_buf());
        tokio::time::sleep(self.latency).await;

        let name = repo
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(vec![PullRequest {
            number: 1,
            title: format!("Update {}", name),
            is_draft: false,
            review_decision: None,
            head_ref_name: "main".into(),
        }])
    }
}
