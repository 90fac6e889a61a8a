use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::client::{PreferenceStore, RetryService, RunFeed};
use crate::error::MonitorError;
use crate::monitor::data_source::RunsDataSource;
use crate::monitor::navigation::Navigator;
use crate::monitor::notifications::NotificationSync;
use crate::monitor::paginator::Paginator;
use crate::monitor::query_state::{QueryStateSync, StatusSelection};
use crate::monitor::retry::{self, RetryController};
use crate::monitor::signal::Control;
use crate::monitor::types::*;

/// Capacity of the transient error channel.
const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Collaborators the runs page is built from.
pub struct RunsPageDeps {
    pub navigator: Arc<dyn Navigator>,
    pub feed: Arc<dyn RunFeed>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub retries: Arc<dyn RetryService>,
    pub project: ProjectContext,
    pub page_size: usize,
}

/// The runs table page: status filter, paginated rows, notification toggle
/// and retry actions, wired together.
pub struct RunsPage {
    selected_status: Control<StatusSelection>,
    notifications_enabled: Control<bool>,
    navigator: Arc<dyn Navigator>,
    data_source: RunsDataSource,
    retry: RetryController,
    notifications: NotificationSync,
    _query_state: QueryStateSync,
    errors: broadcast::Sender<MonitorError>,
}

impl RunsPage {
    /// Build the page. The first fetch starts immediately from the current
    /// route; this resolves once the notification setting has been read.
    pub async fn init(deps: RunsPageDeps) -> Self {
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        let paginator = Paginator::new(deps.page_size);

        let data_source = RunsDataSource::new(
            deps.navigator.clone(),
            paginator,
            deps.project.clone(),
            deps.feed,
            errors.clone(),
        );

        let selected_status = Control::new(None);
        // Show the filter the route already carries, without navigating.
        selected_status.seed(
            FilterState::from_query(&deps.navigator.query_params())
                .status
                .map(|s| s.as_str().to_string()),
        );
        let query_state = QueryStateSync::bind(&selected_status, deps.navigator.clone());

        let retry = RetryController::new(deps.retries, data_source.table(), errors.clone());

        let notifications_enabled = Control::new(false);
        let notifications = NotificationSync::start(
            deps.preferences,
            deps.project.project_id.clone(),
            notifications_enabled.clone(),
            errors.clone(),
        )
        .await;

        info!(project = %deps.project.project_id, "Runs page ready");

        Self {
            selected_status,
            notifications_enabled,
            navigator: deps.navigator,
            data_source,
            retry,
            notifications,
            _query_state: query_state,
            errors,
        }
    }

    /// The status filter field.
    pub fn selected_status(&self) -> &Control<StatusSelection> {
        &self.selected_status
    }

    /// The notification toggle field.
    pub fn notifications_enabled(&self) -> &Control<bool> {
        &self.notifications_enabled
    }

    /// Convenience for a user picking a status (or `None` for all).
    pub fn select_status(&self, status: Option<&str>) {
        self.selected_status.set_value(status.map(str::to_string));
    }

    /// Convenience for a user flipping the notification toggle.
    pub fn set_notifications(&self, enabled: bool) {
        self.notifications_enabled.set_value(enabled);
    }

    /// The toggle is only offered outside the community edition.
    pub fn show_notification_toggle(&self) -> bool {
        self.notifications
            .edition()
            .is_some_and(|e| e != Edition::Community)
    }

    pub fn paginator(&self) -> &Paginator {
        self.data_source.paginator()
    }

    pub fn pages(&self) -> watch::Receiver<RunsView> {
        self.data_source.pages()
    }

    pub fn view(&self) -> RunsView {
        self.data_source.table().snapshot()
    }

    pub fn errors(&self) -> broadcast::Receiver<MonitorError> {
        self.errors.subscribe()
    }

    pub fn is_retry_eligible(&self, row: &RunRow) -> bool {
        retry::is_retry_eligible(row)
    }

    pub fn retry(
        &self,
        run_id: &str,
        strategy: RetryStrategy,
    ) -> Result<JoinHandle<()>, MonitorError> {
        self.retry.retry(run_id, strategy)
    }

    /// Open the detail route of a run.
    pub fn open_run(&self, run_id: &str, new_window: bool) {
        self.navigator.open(&format!("/runs/{}", run_id), new_window);
    }
}
