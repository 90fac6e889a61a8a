use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::monitor::signal::{Subject, Subscription};
use crate::monitor::types::QueryParams;

/// Navigable route state.
pub trait Navigator: Send + Sync {
    /// Move to `path` with exactly the given query parameters.
    fn navigate(&self, path: &str, query: QueryParams);

    /// Open a detail route, optionally outside the current view.
    fn open(&self, path: &str, new_window: bool);

    fn query_params(&self) -> QueryParams;

    /// Observe query parameters. The current value is delivered immediately.
    fn subscribe_query_params(&self, listener: Box<dyn FnMut(&QueryParams) + Send>)
    -> Subscription;
}

/// A recorded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub path: String,
    pub query: QueryParams,
    pub new_window: bool,
}

/// In-process router holding the current path and query string.
pub struct MemoryRouter {
    state: Mutex<RouteState>,
    changes: Subject<QueryParams>,
}

struct RouteState {
    path: String,
    query: QueryParams,
    history: Vec<Navigation>,
}

impl MemoryRouter {
    pub fn new(path: &str, query: QueryParams) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RouteState {
                path: path.to_string(),
                query,
                history: Vec::new(),
            }),
            changes: Subject::new(),
        })
    }

    pub fn path(&self) -> String {
        self.state.lock().path.clone()
    }

    /// Every navigation issued so far, oldest first.
    pub fn history(&self) -> Vec<Navigation> {
        self.state.lock().history.clone()
    }
}

impl Navigator for MemoryRouter {
    fn navigate(&self, path: &str, query: QueryParams) {
        debug!(path = %path, query = ?query, "Navigating");
        {
            let mut state = self.state.lock();
            state.path = path.to_string();
            state.query = query.clone();
            state.history.push(Navigation {
                path: path.to_string(),
                query: query.clone(),
                new_window: false,
            });
        }
        self.changes.emit(&query);
    }

    fn open(&self, path: &str, new_window: bool) {
        let mut state = self.state.lock();
        if !new_window {
            state.path = path.to_string();
            state.query = QueryParams::new();
        }
        state.history.push(Navigation {
            path: path.to_string(),
            query: QueryParams::new(),
            new_window,
        });
    }

    fn query_params(&self) -> QueryParams {
        self.state.lock().query.clone()
    }

    fn subscribe_query_params(
        &self,
        mut listener: Box<dyn FnMut(&QueryParams) + Send>,
    ) -> Subscription {
        let current = self.query_params();
        listener(&current);
        self.changes.subscribe(listener)
    }
}
