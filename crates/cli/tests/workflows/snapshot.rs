//! Snapshot workflow: one status line per repository

use crate::common::FakeStatus;
use cli_lib::session::Session;
use cli_lib::system_config::FetchConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;

const LATENCY: Duration = Duration::from_millis(50);

fn repos(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| PathBuf::from("/repos").join(n)).collect()
}

fn session(fetch: FetchConfig, repos: Vec<PathBuf>, status: &FakeStatus) -> Session {
    Session::with_collectors(&fetch, repos, Arc::new(status.clone()), None)
}

#[tokio::test(start_paused = true)]
async fn test_failures_do_not_hide_other_repos() {
    let status = FakeStatus::new(LATENCY);
    let all = repos(&["a", "b", "c"]);
    status.answer(&all[0], "main");
    status.answer(&all[2], "dev");

    let reports = session(FetchConfig::default(), all.clone(), &status)
        .snapshot()
        .await;

    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].status.as_ref().unwrap().branch.as_deref(), Some("main"));
    assert!(reports[1].status.is_err());
    assert_eq!(reports[2].status.as_ref().unwrap().branch.as_deref(), Some("dev"));
    assert_eq!(reports[1].path, all[1]);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_snapshots_share_fetches() {
    let status = FakeStatus::new(LATENCY);
    let all = repos(&["a", "b"]);
    for repo in &all {
        status.answer(repo, "main");
    }
    let session = session(FetchConfig::default(), all.clone(), &status);

    let (first, second) = tokio::join!(session.snapshot(), session.snapshot());
    assert!(first.iter().chain(&second).all(|r| r.is_available()));
    assert_eq!(status.calls_for(&all[0]), 1);
    assert_eq!(status.calls_for(&all[1]), 1);
}

#[tokio::test(start_paused = true)]
async fn test_subprocess_concurrency_is_bounded() {
    let status = FakeStatus::new(LATENCY);
    let all = repos(&["a", "b", "c", "d", "e", "f"]);
    for repo in &all {
        status.answer(repo, "main");
    }
    let fetch = FetchConfig {
        subprocess_concurrency: 2,
        ..Default::default()
    };
    let session = session(fetch, all, &status);

    let reports = session.snapshot().await;
    assert!(reports.iter().all(|r| r.is_available()));
    assert_eq!(status.calls(), 6);
    assert_eq!(status.peak(), 2);
    assert_eq!(session.pool().active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_status_is_cached_until_ttl() {
    let status = FakeStatus::new(LATENCY);
    let all = repos(&["a"]);
    status.answer(&all[0], "main");
    let session = session(FetchConfig::default(), all.clone(), &status);

    session.snapshot().await;
    session.snapshot().await;
    assert_eq!(status.calls(), 1);
    assert!(session.cached_status(&all[0]).is_some());

    advance(Duration::from_secs(6)).await;
    assert!(session.cached_status(&all[0]).is_none());
    session.snapshot().await;
    assert_eq!(status.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_bypasses_cache() {
    let status = FakeStatus::new(LATENCY);
    let all = repos(&["a"]);
    status.answer(&all[0], "main");
    let session = session(FetchConfig::default(), all.clone(), &status);

    session.status(&all[0]).await.unwrap();
    status.answer(&all[0], "feature");

    let cached = session.status(&all[0]).await.unwrap();
    assert_eq!(cached.branch.as_deref(), Some("main"));

    let fresh = session.refresh_status(&all[0]).await.unwrap();
    assert_eq!(fresh.branch.as_deref(), Some("feature"));
    assert_eq!(status.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_retried() {
    let status = FakeStatus::new(LATENCY);
    let all = repos(&["broken"]);
    let session = session(FetchConfig::default(), all.clone(), &status);

    assert!(session.status(&all[0]).await.is_err());
    assert!(session.status(&all[0]).await.is_err());
    assert_eq!(status.calls(), 2);

    status.answer(Path::new("/repos/broken"), "main");
    assert!(session.status(&all[0]).await.is_ok());
}
