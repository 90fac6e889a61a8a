use std::sync::Arc;

use parking_lot::Mutex;

use crate::monitor::signal::{Subject, Subscription};
use crate::monitor::types::{DEFAULT_PAGE_SIZE, PageRequest};

#[derive(Debug, Clone)]
struct Cursors {
    limit: usize,
    current: Option<String>,
    next: Option<String>,
    previous: Option<String>,
}

/// Cursor paginator control.
///
/// Emits a [`PageRequest`] whenever the user moves to another page or changes
/// the page size. The owner tells it which cursors the displayed page offers.
#[derive(Clone)]
pub struct Paginator {
    state: Arc<Mutex<Cursors>>,
    page_changes: Subject<PageRequest>,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(Cursors {
                limit: page_size.max(1),
                current: None,
                next: None,
                previous: None,
            })),
            page_changes: Subject::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.state.lock().limit
    }

    /// Request describing the page currently selected.
    pub fn current(&self) -> PageRequest {
        let state = self.state.lock();
        PageRequest {
            cursor: state.current.clone(),
            limit: state.limit,
        }
    }

    pub fn has_next(&self) -> bool {
        self.state.lock().next.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.state.lock().previous.is_some()
    }

    /// Record the cursors of the page just displayed.
    pub fn set_next_and_previous(&self, next: Option<String>, previous: Option<String>) {
        let mut state = self.state.lock();
        state.next = next;
        state.previous = previous;
    }

    /// Back to the first page, without emitting.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.current = None;
        state.next = None;
        state.previous = None;
    }

    /// Move forward. Returns `false` when there is no next page.
    pub fn next(&self) -> bool {
        let request = {
            let mut state = self.state.lock();
            let Some(cursor) = state.next.clone() else {
                return false;
            };
            state.current = Some(cursor);
            PageRequest {
                cursor: state.current.clone(),
                limit: state.limit,
            }
        };
        self.page_changes.emit(&request);
        true
    }

    /// Move back. Returns `false` when there is no previous page.
    pub fn previous(&self) -> bool {
        let request = {
            let mut state = self.state.lock();
            let Some(cursor) = state.previous.clone() else {
                return false;
            };
            state.current = Some(cursor);
            PageRequest {
                cursor: state.current.clone(),
                limit: state.limit,
            }
        };
        self.page_changes.emit(&request);
        true
    }

    /// Change the page size. Always restarts from the first page.
    pub fn set_page_size(&self, limit: usize) {
        let request = {
            let mut state = self.state.lock();
            state.limit = limit.max(1);
            state.current = None;
            state.next = None;
            state.previous = None;
            PageRequest::first(state.limit)
        };
        self.page_changes.emit(&request);
    }

    /// Re-emit the current page, e.g. for a periodic refresh.
    pub fn refresh(&self) {
        let request = self.current();
        self.page_changes.emit(&request);
    }

    pub fn subscribe(&self, listener: impl FnMut(&PageRequest) + Send + 'static) -> Subscription {
        self.page_changes.subscribe(listener)
    }
}
