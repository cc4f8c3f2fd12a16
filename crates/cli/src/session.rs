//! Dashboard session: every data source behind one handle
//!
//! Each source is a [`CachedSource`] (TTL cache + single-flight) and all of
//! them share one [`ConcurrencyPool`], so the number of `git`/`gh` processes
//! running at once is bounded no matter how many repositories are shown.

use crate::system_config::{FetchConfig, SystemConfig};
use collect::{CollectError, Collector, GitStatusCollector, PullRequest, RepoStatus, ReviewCollector};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use vigil_core::{CachedSource, ConcurrencyPool};

pub type StatusResult = Result<RepoStatus, CollectError>;
pub type ReviewResult = Result<Vec<PullRequest>, CollectError>;

type StatusCollector = Arc<dyn Collector<Output = RepoStatus>>;
type ReviewsCollector = Arc<dyn Collector<Output = Vec<PullRequest>>>;

/// Status of one repository in a snapshot
#[derive(Debug, Clone)]
pub struct RepoReport {
    pub path: PathBuf,
    pub status: StatusResult,
}

impl RepoReport {
    pub fn is_available(&self) -> bool {
        self.status.is_ok()
    }
}

/// Shared fetch state for a set of repositories
#[derive(Clone)]
pub struct Session {
    repos: Arc<Vec<PathBuf>>,
    pool: ConcurrencyPool,
    status: CachedSource<PathBuf, RepoStatus, CollectError>,
    reviews: CachedSource<PathBuf, Vec<PullRequest>, CollectError>,
    status_collector: StatusCollector,
    review_collector: Option<ReviewsCollector>,
}

impl Session {
    /// Session backed by `git` and (when enabled) `gh`.
    pub fn new(config: &SystemConfig, repos: Vec<PathBuf>) -> Self {
        let reviews = config
            .review
            .enabled
            .then(|| Arc::new(ReviewCollector::new(config.review.limit)) as ReviewsCollector);

        Self::with_collectors(
            &config.fetch,
            repos,
            Arc::new(GitStatusCollector::new()),
            reviews,
        )
    }

    pub fn with_collectors(
        fetch: &FetchConfig,
        repos: Vec<PathBuf>,
        status_collector: StatusCollector,
        review_collector: Option<ReviewsCollector>,
    ) -> Self {
        let pool = ConcurrencyPool::new(fetch.subprocess_concurrency);
        Self {
            repos: Arc::new(repos),
            status: CachedSource::new(
                status_collector.name(),
                fetch.status_ttl(),
                Some(pool.clone()),
            ),
            reviews: CachedSource::new(
                review_collector.as_ref().map_or("reviews", |c| c.name()),
                fetch.review_ttl(),
                Some(pool.clone()),
            ),
            pool,
            status_collector,
            review_collector,
        }
    }

    pub fn repos(&self) -> &[PathBuf] {
        &self.repos
    }

    pub fn repo(&self, index: usize) -> Option<&Path> {
        self.repos.get(index).map(PathBuf::as_path)
    }

    pub fn index_of(&self, repo: &Path) -> Option<usize> {
        self.repos.iter().position(|r| r == repo)
    }

    pub fn pool(&self) -> &ConcurrencyPool {
        &self.pool
    }

    /// Working-tree status, from cache when fresh.
    pub async fn status(&self, repo: &Path) -> StatusResult {
        let collector = Arc::clone(&self.status_collector);
        let path = repo.to_path_buf();
        self.status
            .fetch(repo.to_path_buf(), move || async move {
                collector.collect(&path).await
            })
            .await
    }

    /// Working-tree status read fresh from disk.
    pub async fn refresh_status(&self, repo: &Path) -> StatusResult {
        self.status.invalidate(&repo.to_path_buf());
        self.status(repo).await
    }

    /// Cached status without fetching
    pub fn cached_status(&self, repo: &Path) -> Option<RepoStatus> {
        self.status.peek(&repo.to_path_buf())
    }

    pub fn reviews_enabled(&self) -> bool {
        self.review_collector.is_some()
    }

    /// Open pull requests; `None` when review collection is disabled.
    pub async fn reviews(&self, repo: &Path) -> Option<ReviewResult> {
        let collector = Arc::clone(self.review_collector.as_ref()?);
        let path = repo.to_path_buf();
        let result = self
            .reviews
            .fetch(repo.to_path_buf(), move || async move {
                collector.collect(&path).await
            })
            .await;
        Some(result)
    }

    /// Status of every repository, fetched concurrently.
    ///
    /// Failures are reported per repository; one failure never hides the
    /// others.
    pub async fn snapshot(&self) -> Vec<RepoReport> {
        let reports = join_all(self.repos.iter().map(|repo| async move {
            RepoReport {
                path: repo.clone(),
                status: self.status(repo).await,
            }
        }))
        .await;

        let unavailable = reports.iter().filter(|r| !r.is_available()).count();
        debug!(repos = reports.len(), unavailable, "snapshot complete");
        reports
    }

    /// Drop every cached value, then take a fresh snapshot.
    pub async fn refresh_all(&self) -> Vec<RepoReport> {
        self.status.clear();
        self.reviews.clear();
        self.snapshot().await
    }
}
