//! Tests for pushing the status filter selection into the route.

mod common;

use std::sync::Arc;

use runwatch::monitor::navigation::{MemoryRouter, Navigator};
use runwatch::monitor::query_state::{QueryStateSync, RUNS_PATH};
use runwatch::monitor::signal::Control;

use common::query;

fn setup() -> (Arc<MemoryRouter>, Control<Option<String>>, QueryStateSync) {
    let router = MemoryRouter::new(RUNS_PATH, query(None));
    let selection = Control::new(None);
    let sync = QueryStateSync::bind(&selection, router.clone());
    (router, selection, sync)
}

fn pick(selection: &Control<Option<String>>, value: Option<&str>) {
    selection.set_value(value.map(str::to_string));
}

#[test]
fn binding_does_not_navigate() {
    let (router, _selection, _sync) = setup();
    assert!(router.history().is_empty());
}

#[test]
fn repeated_selection_navigates_once() {
    let (router, selection, _sync) = setup();

    for _ in 0..5 {
        pick(&selection, Some("FAILED"));
    }

    let history = router.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].path, RUNS_PATH);
    assert_eq!(history[0].query, query(Some("FAILED")));
    assert_eq!(router.query_params(), query(Some("FAILED")));
}

#[test]
fn one_navigation_per_distinct_change() {
    let (router, selection, _sync) = setup();

    pick(&selection, Some("FAILED"));
    pick(&selection, Some("FAILED"));
    pick(&selection, Some("SUCCEEDED"));
    pick(&selection, Some("SUCCEEDED"));
    pick(&selection, None);
    pick(&selection, None);
    pick(&selection, Some("FAILED"));

    let queries: Vec<_> = router.history().into_iter().map(|n| n.query).collect();
    assert_eq!(
        queries,
        vec![
            query(Some("FAILED")),
            query(Some("SUCCEEDED")),
            query(None),
            query(Some("FAILED")),
        ]
    );
}

#[test]
fn unrecognized_value_clears_the_parameter() {
    let (router, selection, _sync) = setup();

    pick(&selection, Some("FAILED"));
    pick(&selection, Some("stale-widget-value"));

    let history = router.history();
    assert_eq!(history.len(), 2);
    assert!(history[1].query.is_empty());
    assert!(router.query_params().is_empty());
}

#[test]
fn seeding_the_selection_is_not_an_edit() {
    let (router, selection, _sync) = setup();

    selection.seed(Some("RUNNING".to_string()));
    assert!(router.history().is_empty());
}

#[test]
fn dropping_the_binding_stops_navigation() {
    let (router, selection, sync) = setup();
    drop(sync);

    pick(&selection, Some("FAILED"));
    assert!(router.history().is_empty());
}
