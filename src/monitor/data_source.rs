use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::RunFeed;
use crate::error::MonitorError;
use crate::monitor::navigation::Navigator;
use crate::monitor::paginator::Paginator;
use crate::monitor::signal::{Subscription, distinct_until_changed};
use crate::monitor::types::*;

/// Handle on the rows currently displayed.
#[derive(Clone)]
pub struct RunTable {
    view: watch::Sender<RunsView>,
}

impl RunTable {
    fn new() -> Self {
        Self {
            view: watch::Sender::new(RunsView::default()),
        }
    }

    pub fn snapshot(&self) -> RunsView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunsView> {
        self.view.subscribe()
    }

    pub fn status_of(&self, run_id: &str) -> Option<RunStatus> {
        self.view.borrow().row(run_id).map(RunRow::current_status)
    }

    /// Overwrite a displayed row's status ahead of the server.
    /// Returns `false` if the run is not on the current page.
    pub(crate) fn set_optimistic(&self, run_id: &str, status: RunStatus) -> bool {
        self.view.send_if_modified(|view| {
            let Some(page) = view.page.as_mut() else {
                return false;
            };
            match page.data.iter_mut().find(|r| r.run.id == run_id) {
                Some(row) => {
                    row.status = Tracked::Optimistic(status);
                    true
                }
                None => false,
            }
        })
    }
}

struct Inner {
    feed: Arc<dyn RunFeed>,
    project: ProjectContext,
    navigator: Arc<dyn Navigator>,
    paginator: Paginator,
    table: RunTable,
    errors: broadcast::Sender<MonitorError>,
    generation: AtomicU64,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

/// Live page of runs driven by the route filter and the paginator.
///
/// A filter change resets the paginator and loads the first page; a page
/// event reloads with the filter currently in the URL. Only the most
/// recently issued fetch may publish: issuing a new one aborts the previous
/// task, and a generation check drops anything that slips through.
///
/// Must be created inside a Tokio runtime; the initial route emission
/// starts the first fetch immediately.
pub struct RunsDataSource {
    inner: Arc<Inner>,
    _route: Subscription,
    _pages: Subscription,
}

impl RunsDataSource {
    pub fn new(
        navigator: Arc<dyn Navigator>,
        paginator: Paginator,
        project: ProjectContext,
        feed: Arc<dyn RunFeed>,
        errors: broadcast::Sender<MonitorError>,
    ) -> Self {
        let inner = Arc::new(Inner {
            feed,
            project,
            navigator: navigator.clone(),
            paginator: paginator.clone(),
            table: RunTable::new(),
            errors,
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let mut on_filter = distinct_until_changed(move |filter: &FilterState| {
            if let Some(inner) = weak.upgrade() {
                inner.paginator.reset();
                let request = PageRequest::first(inner.paginator.page_size());
                inner.fetch(*filter, request);
            }
        });
        let route = navigator.subscribe_query_params(Box::new(move |query: &QueryParams| {
            on_filter(&FilterState::from_query(query));
        }));

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let pages = paginator.subscribe(move |request: &PageRequest| {
            if let Some(inner) = weak.upgrade() {
                let filter = FilterState::from_query(&inner.navigator.query_params());
                inner.fetch(filter, request.clone());
            }
        });

        Self {
            inner,
            _route: route,
            _pages: pages,
        }
    }

    pub fn table(&self) -> RunTable {
        self.inner.table.clone()
    }

    /// Stream of published views.
    pub fn pages(&self) -> watch::Receiver<RunsView> {
        self.inner.table.subscribe()
    }

    pub fn paginator(&self) -> &Paginator {
        &self.inner.paginator
    }
}

impl Drop for RunsDataSource {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.in_flight.lock().take() {
            handle.abort();
        }
    }
}

impl Inner {
    fn fetch(self: &Arc<Self>, filter: FilterState, request: PageRequest) {
        let mut generation = 0;
        self.table.view.send_modify(|view| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            view.loading = true;
        });
        info!(
            status = ?filter.status,
            cursor = ?request.cursor,
            limit = request.limit,
            generation,
            "Fetching runs"
        );

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = inner
                .feed
                .fetch_page(&inner.project, &filter, &request)
                .await;
            inner.publish(generation, filter, request, result);
        });

        if let Some(previous) = self.in_flight.lock().replace(handle) {
            previous.abort();
        }
    }

    fn publish(
        &self,
        generation: u64,
        filter: FilterState,
        request: PageRequest,
        result: Result<SeekPage<Run>>,
    ) {
        // The check and the update share the watch lock with `fetch`.
        let current = |inner: &Self| inner.generation.load(Ordering::SeqCst) == generation;
        match result {
            Ok(page) => {
                let rows = SeekPage::new(
                    page.data.into_iter().map(RunRow::from).collect(),
                    page.next,
                    page.previous,
                );
                let count = rows.data.len();
                let published = self.table.view.send_if_modified(|view| {
                    if !current(self) {
                        return false;
                    }
                    self.paginator
                        .set_next_and_previous(rows.next.clone(), rows.previous.clone());
                    view.page = Some(rows);
                    view.loading = false;
                    view.error = None;
                    view.filter = filter;
                    view.request = request;
                    true
                });
                if published {
                    debug!(rows = count, generation, "Published page");
                } else {
                    debug!(generation, "Discarding superseded page");
                }
            }
            Err(err) => {
                let error = MonitorError::Fetch(MonitorError::describe(&err));
                let published = self.table.view.send_if_modified(|view| {
                    if !current(self) {
                        return false;
                    }
                    view.loading = false;
                    view.error = Some(error.clone());
                    true
                });
                if published {
                    warn!(error = %error, generation, "Run fetch failed");
                    let _ = self.errors.send(error);
                } else {
                    debug!(generation, "Discarding superseded failure");
                }
            }
        }
    }
}
