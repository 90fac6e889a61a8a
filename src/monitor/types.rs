use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Route query parameters, keyed by name.
pub type QueryParams = BTreeMap<String, String>;

/// Query parameter carrying the status filter.
pub const STATUS_PARAM: &str = "status";

/// Page size used when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Status of a workflow run as reported by the execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Failed,
    QuotaExceeded,
    InternalError,
    Paused,
    Running,
    Stopped,
    Succeeded,
    Timeout,
}

impl RunStatus {
    pub const ALL: [RunStatus; 8] = [
        RunStatus::Failed,
        RunStatus::QuotaExceeded,
        RunStatus::InternalError,
        RunStatus::Paused,
        RunStatus::Running,
        RunStatus::Stopped,
        RunStatus::Succeeded,
        RunStatus::Timeout,
    ];

    /// Wire form, also used in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Failed => "FAILED",
            RunStatus::QuotaExceeded => "QUOTA_EXCEEDED",
            RunStatus::InternalError => "INTERNAL_ERROR",
            RunStatus::Paused => "PAUSED",
            RunStatus::Running => "RUNNING",
            RunStatus::Stopped => "STOPPED",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Timeout => "TIMEOUT",
        }
    }

    /// Whether a run in this status may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::InternalError | RunStatus::QuotaExceeded
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown run status: {}", s))
    }
}

/// How a retried run is re-executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryStrategy {
    OnLatestVersion,
    FromFailedStep,
}

impl RetryStrategy {
    /// Options offered by the retry menu, in display order.
    pub const ALL: [RetryStrategy; 2] =
        [RetryStrategy::OnLatestVersion, RetryStrategy::FromFailedStep];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetryStrategy::OnLatestVersion => "ON_LATEST_VERSION",
            RetryStrategy::FromFailedStep => "FROM_FAILED_STEP",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RetryStrategy::OnLatestVersion => "Retry on Latest Version",
            RetryStrategy::FromFailedStep => "Retry From Failed Step",
        }
    }
}

impl std::fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted per-project notification setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Never,
    Always,
    NewIssues,
}

impl NotificationStatus {
    /// Toggle value for a stored setting. Only `Always` counts as enabled.
    pub fn is_enabled(&self) -> bool {
        matches!(self, NotificationStatus::Always)
    }

    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            NotificationStatus::Always
        } else {
            NotificationStatus::Never
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Edition {
    #[default]
    Community,
    Enterprise,
    Cloud,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub notify_status: NotificationStatus,
    #[serde(default)]
    pub edition: Edition,
}

/// Identifies the project the view is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub project_id: String,
}

impl ProjectContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }
}

/// One execution of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub flow_name: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Cursor-paginated slice of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

impl<T> SeekPage<T> {
    pub fn new(data: Vec<T>, next: Option<String>, previous: Option<String>) -> Self {
        Self {
            data,
            next,
            previous,
        }
    }
}

/// Position and size of a requested page. A `None` cursor is the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            cursor: None,
            limit,
        }
    }

    pub fn is_first(&self) -> bool {
        self.cursor.is_none()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// Status constraint currently applied to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterState {
    pub status: Option<RunStatus>,
}

impl FilterState {
    pub fn new(status: Option<RunStatus>) -> Self {
        Self { status }
    }

    /// Read the filter from route query parameters. Unrecognized values mean no filter.
    pub fn from_query(params: &QueryParams) -> Self {
        let status = params
            .get(STATUS_PARAM)
            .and_then(|raw| raw.parse::<RunStatus>().ok());
        Self { status }
    }
}

/// A value that is either confirmed by the server or written locally ahead of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracked<T> {
    Confirmed(T),
    /// Written locally; replaced by the next fetch.
    Optimistic(T),
}

impl<T: Copy> Tracked<T> {
    pub fn value(&self) -> T {
        match self {
            Tracked::Confirmed(v) | Tracked::Optimistic(v) => *v,
        }
    }

    pub fn is_optimistic(&self) -> bool {
        matches!(self, Tracked::Optimistic(_))
    }
}

/// A run as displayed by the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRow {
    pub run: Run,
    pub status: Tracked<RunStatus>,
}

impl RunRow {
    pub fn id(&self) -> &str {
        &self.run.id
    }

    /// The status the table shows, optimistic or not.
    pub fn current_status(&self) -> RunStatus {
        self.status.value()
    }
}

impl From<Run> for RunRow {
    fn from(run: Run) -> Self {
        let status = Tracked::Confirmed(run.status);
        Self { run, status }
    }
}

/// Latest state published by the run data source.
#[derive(Debug, Clone, Default)]
pub struct RunsView {
    /// Rows of the page currently displayed; `None` until the first fetch lands.
    pub page: Option<SeekPage<RunRow>>,
    pub loading: bool,
    /// Error from the most recent attempt, cleared by the next success.
    pub error: Option<crate::error::MonitorError>,
    pub filter: FilterState,
    pub request: PageRequest,
}

impl RunsView {
    pub fn rows(&self) -> &[RunRow] {
        self.page.as_ref().map(|p| p.data.as_slice()).unwrap_or(&[])
    }

    pub fn row(&self, run_id: &str) -> Option<&RunRow> {
        self.rows().iter().find(|r| r.id() == run_id)
    }
}
