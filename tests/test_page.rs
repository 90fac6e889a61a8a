//! End-to-end tests for the composed runs page.

mod common;

use std::sync::Arc;

use runwatch::client::memory::MemoryPlatform;
use runwatch::monitor::navigation::{MemoryRouter, Navigator};
use runwatch::monitor::page::{RunsPage, RunsPageDeps};
use runwatch::monitor::query_state::RUNS_PATH;
use runwatch::monitor::types::*;

use common::{GatedFeed, query, run, settle, wait_for_view, wait_until};

fn project(edition: Edition) -> Project {
    Project {
        id: "proj".into(),
        notify_status: NotificationStatus::Always,
        edition,
    }
}

async fn page_with(
    router: &Arc<MemoryRouter>,
    feed: Arc<dyn runwatch::client::RunFeed>,
    platform: &Arc<MemoryPlatform>,
    page_size: usize,
) -> RunsPage {
    RunsPage::init(RunsPageDeps {
        navigator: router.clone(),
        feed,
        preferences: platform.clone(),
        retries: platform.clone(),
        project: ProjectContext::new("proj"),
        page_size,
    })
    .await
}

#[tokio::test]
async fn filter_page_then_refilter_discards_pending_page() {
    let feed = Arc::new(GatedFeed::default());
    let platform = Arc::new(MemoryPlatform::new());
    platform.insert_project(project(Edition::Cloud));
    let router = MemoryRouter::new(RUNS_PATH, query(Some("FAILED")));
    let page = page_with(&router, feed.clone(), &platform, 2).await;
    let mut pages = page.pages();

    // filter=FAILED, page 1
    let f = feed.clone();
    wait_until(move || f.calls().len() == 1).await;
    assert_eq!(
        feed.calls()[0],
        (FilterState::new(Some(RunStatus::Failed)), PageRequest::first(2))
    );
    feed.release(
        0,
        SeekPage::new(
            vec![run("f1", RunStatus::Failed), run("f2", RunStatus::Failed)],
            Some("c2".into()),
            None,
        ),
    );
    let view = wait_for_view(&mut pages, |v| v.page.is_some()).await;
    assert_eq!(view.rows().len(), 2);

    // next page, same filter
    assert!(page.paginator().next());
    let f = feed.clone();
    wait_until(move || f.calls().len() == 2).await;
    assert_eq!(
        feed.calls()[1],
        (
            FilterState::new(Some(RunStatus::Failed)),
            PageRequest {
                cursor: Some("c2".into()),
                limit: 2,
            }
        )
    );

    // change the filter while page 2 is still pending
    page.select_status(Some("SUCCEEDED"));
    let f = feed.clone();
    wait_until(move || f.calls().len() == 3).await;
    assert_eq!(
        feed.calls()[2],
        (FilterState::new(Some(RunStatus::Succeeded)), PageRequest::first(2))
    );
    assert!(page.paginator().current().is_first());
    assert_eq!(router.query_params(), query(Some("SUCCEEDED")));

    feed.release(2, SeekPage::new(vec![run("s1", RunStatus::Succeeded)], None, None));
    feed.release(
        1,
        SeekPage::new(vec![run("f3", RunStatus::Failed)], None, Some("c0".into())),
    );
    let view = wait_for_view(&mut pages, |v| v.filter.status == Some(RunStatus::Succeeded)).await;
    settle().await;

    assert_eq!(view.rows().len(), 1);
    assert_eq!(view.rows()[0].id(), "s1");
    assert!(page.view().row("f3").is_none());
    assert_eq!(feed.calls().len(), 3);
}

#[tokio::test]
async fn selecting_the_current_status_does_not_navigate() {
    let platform = Arc::new(MemoryPlatform::with_runs(vec![run("a", RunStatus::Failed)]));
    platform.insert_project(project(Edition::Cloud));
    let router = MemoryRouter::new(RUNS_PATH, query(None));
    let page = page_with(&router, platform.clone(), &platform, 10).await;

    page.select_status(Some("FAILED"));
    page.select_status(Some("FAILED"));
    page.select_status(Some("FAILED"));

    assert_eq!(router.history().len(), 1);
    let mut pages = page.pages();
    let view = wait_for_view(&mut pages, |v| v.filter.status == Some(RunStatus::Failed)).await;
    assert_eq!(view.rows().len(), 1);
}

#[tokio::test]
async fn widget_shows_status_from_route() {
    let platform = Arc::new(MemoryPlatform::new());
    platform.insert_project(project(Edition::Cloud));
    let router = MemoryRouter::new(RUNS_PATH, query(Some("TIMEOUT")));
    let page = page_with(&router, platform.clone(), &platform, 10).await;

    assert_eq!(page.selected_status().value().as_deref(), Some("TIMEOUT"));
    assert!(router.history().is_empty());
}

#[tokio::test]
async fn retry_through_page_updates_rendered_row() {
    let platform = Arc::new(MemoryPlatform::with_runs(vec![
        run("a", RunStatus::InternalError),
        run("b", RunStatus::Succeeded),
    ]));
    platform.insert_project(project(Edition::Cloud));
    let router = MemoryRouter::new(RUNS_PATH, query(None));
    let page = page_with(&router, platform.clone(), &platform, 10).await;
    let mut pages = page.pages();
    let view = wait_for_view(&mut pages, |v| v.page.is_some()).await;

    let a = view.row("a").unwrap();
    let b = view.row("b").unwrap();
    assert!(page.is_retry_eligible(a));
    assert!(!page.is_retry_eligible(b));

    page.retry("a", RetryStrategy::OnLatestVersion).unwrap();
    assert_eq!(
        page.view().row("a").unwrap().status,
        Tracked::Optimistic(RunStatus::Running)
    );

    let p = platform.clone();
    wait_until(move || p.retries().len() == 1).await;
    page.paginator().refresh();
    let view = wait_for_view(&mut pages, |v| {
        v.row("a").is_some_and(|r| !r.status.is_optimistic())
    })
    .await;
    assert_eq!(
        view.row("a").unwrap().status,
        Tracked::Confirmed(RunStatus::Running)
    );
}

#[tokio::test]
async fn notification_toggle_round_trip() {
    let platform = Arc::new(MemoryPlatform::new());
    platform.insert_project(project(Edition::Enterprise));
    let router = MemoryRouter::new(RUNS_PATH, query(None));
    let page = page_with(&router, platform.clone(), &platform, 10).await;

    assert!(page.show_notification_toggle());
    assert!(page.notifications_enabled().value());

    page.set_notifications(false);
    let p = platform.clone();
    wait_until(move || p.writes().len() == 1).await;
    settle().await;
    assert_eq!(platform.writes()[0].1, NotificationStatus::Never);
    assert_eq!(platform.writes().len(), 1);
}

#[tokio::test]
async fn community_edition_hides_notification_toggle() {
    let platform = Arc::new(MemoryPlatform::new());
    platform.insert_project(project(Edition::Community));
    let router = MemoryRouter::new(RUNS_PATH, query(None));
    let page = page_with(&router, platform.clone(), &platform, 10).await;

    assert!(!page.show_notification_toggle());
}

#[tokio::test]
async fn open_run_targets_detail_route() {
    let platform = Arc::new(MemoryPlatform::new());
    platform.insert_project(project(Edition::Cloud));
    let router = MemoryRouter::new(RUNS_PATH, query(None));
    let page = page_with(&router, platform.clone(), &platform, 10).await;

    page.open_run("abc", true);
    let last = router.history().pop().unwrap();
    assert_eq!(last.path, "/runs/abc");
    assert!(last.new_window);
    assert_eq!(router.path(), RUNS_PATH);

    page.open_run("abc", false);
    assert_eq!(router.path(), "/runs/abc");
}
