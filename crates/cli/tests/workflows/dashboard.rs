//! Dashboard workflow: selection-driven detail fetches and live refreshes

use crate::common::{FakeReviews, FakeStatus};
use collect::{Collector, PullRequest};
use cli_lib::session::{ReviewResult, Session, StatusResult};
use cli_lib::system_config::FetchConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use vigil_core::FetchScheduler;

const DEBOUNCE: Duration = Duration::from_millis(150);

fn setup(reviews: Option<&FakeReviews>) -> (Session, FakeStatus) {
    let status = FakeStatus::new(Duration::from_millis(40));
    let repos: Vec<PathBuf> = ["a", "b", "c"]
        .iter()
        .map(|n| PathBuf::from("/repos").join(n))
        .collect();
    for repo in &repos {
        status.answer(repo, "main");
    }

    let session = Session::with_collectors(
        &FetchConfig::default(),
        repos,
        Arc::new(status.clone()),
        reviews.map(|r| Arc::new(r.clone()) as Arc<dyn Collector<Output = Vec<PullRequest>>>),
    );
    (session, status)
}

fn select(
    detail: &FetchScheduler<(usize, Option<ReviewResult>)>,
    session: &Session,
    index: usize,
) -> u64 {
    let session = session.clone();
    let repo = session.repo(index).unwrap().to_path_buf();
    detail.trigger(DEBOUNCE, move || async move { (index, session.reviews(&repo).await) })
}

#[tokio::test(start_paused = true)]
async fn test_rapid_selection_fetches_only_final_repo() {
    let reviews = FakeReviews::new(Duration::from_millis(80));
    let (session, _status) = setup(Some(&reviews));
    let (detail, mut details) = FetchScheduler::new();

    select(&detail, &session, 0);
    sleep(Duration::from_millis(50)).await;
    select(&detail, &session, 1);
    sleep(Duration::from_millis(50)).await;
    let last = select(&detail, &session, 2);

    let delivery = details.recv().await.unwrap();
    assert_eq!(delivery.request_id, last);
    let (index, result) = delivery.value;
    assert_eq!(index, 2);
    assert_eq!(result.unwrap().unwrap()[0].title, "Update c");

    assert_eq!(reviews.calls(), vec![PathBuf::from("/repos/c")]);
}

#[tokio::test(start_paused = true)]
async fn test_moving_selection_discards_slow_detail() {
    let reviews = FakeReviews::new(Duration::from_millis(500));
    let (session, _status) = setup(Some(&reviews));
    let (detail, mut details) = FetchScheduler::new();

    select(&detail, &session, 0);
    // Let the first fetch start, then move on before it finishes
    sleep(DEBOUNCE + Duration::from_millis(10)).await;
    select(&detail, &session, 1);

    let delivery = details.recv().await.unwrap();
    assert_eq!(delivery.value.0, 1);

    sleep(Duration::from_secs(2)).await;
    assert!(details.try_recv().is_err());
    assert_eq!(reviews.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reviews_disabled() {
    let (session, _status) = setup(None);
    assert!(!session.reviews_enabled());
    assert!(session.reviews(session.repo(0).unwrap()).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_change_notification_refetches_immediately() {
    let (session, status) = setup(None);
    let repo = session.repo(1).unwrap().to_path_buf();
    session.snapshot().await;
    assert_eq!(status.calls_for(&repo), 1);

    let (view, mut deliveries) = FetchScheduler::<StatusResult>::new();
    status.answer(&repo, "feature");

    // Two notifications in a row: only the second result is shown
    for _ in 0..2 {
        let session = session.clone();
        let repo = repo.clone();
        view.immediate(move || async move { session.refresh_status(&repo).await });
    }

    let delivery = deliveries.recv().await.unwrap();
    assert_eq!(delivery.request_id, 2);
    assert_eq!(delivery.value.unwrap().branch.as_deref(), Some("feature"));

    sleep(Duration::from_secs(1)).await;
    assert!(deliveries.try_recv().is_err());
}
