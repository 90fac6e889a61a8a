use std::sync::Arc;

use tracing::{debug, warn};

use crate::monitor::navigation::Navigator;
use crate::monitor::signal::{Control, Subscription, distinct_until_changed};
use crate::monitor::types::{QueryParams, RunStatus, STATUS_PARAM};

/// Route the runs table lives at.
pub const RUNS_PATH: &str = "runs";

/// Raw value of the status filter widget. `None` means "all statuses".
pub type StatusSelection = Option<String>;

/// Pushes status filter edits into the URL.
///
/// One navigation per distinct edit. Values that are not a known
/// [`RunStatus`] clear the parameter instead of being written. The current
/// URL is not read here; the data source owns the initial filter.
pub struct QueryStateSync {
    _subscription: Subscription,
}

impl QueryStateSync {
    pub fn bind(selection: &Control<StatusSelection>, navigator: Arc<dyn Navigator>) -> Self {
        let subscription = selection.value_changes().subscribe(distinct_until_changed(
            move |selected: &StatusSelection| {
                navigator.navigate(RUNS_PATH, status_query(selected.as_deref()));
            },
        ));
        Self {
            _subscription: subscription,
        }
    }
}

/// Query string for a selected status.
pub fn status_query(selected: Option<&str>) -> QueryParams {
    let mut query = QueryParams::new();
    match selected {
        Some(raw) => match raw.parse::<RunStatus>() {
            Ok(status) => {
                debug!(status = %status, "Applying status filter");
                query.insert(STATUS_PARAM.to_string(), status.as_str().to_string());
            }
            Err(_) => warn!(value = %raw, "Ignoring unrecognized status filter"),
        },
        None => debug!("Clearing status filter"),
    }
    query
}
