use thiserror::Error;

use crate::monitor::types::RunStatus;

/// Transient failure of a single view operation. None of these stop the view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("Failed to fetch runs: {0}")]
    Fetch(String),

    #[error("Failed to read notification setting: {0}")]
    PreferenceRead(String),

    #[error("Failed to update notification setting: {0}")]
    PreferenceWrite(String),

    #[error("Failed to retry run {run_id}: {message}")]
    RetryDispatch { run_id: String, message: String },

    #[error("Run {run_id} cannot be retried while {status}")]
    RetryNotAllowed { run_id: String, status: RunStatus },

    #[error("Run {0} is not on the current page")]
    UnknownRun(String),
}

impl MonitorError {
    /// Render an `anyhow` chain the way the CLI prints it.
    pub(crate) fn describe(err: &anyhow::Error) -> String {
        format!("{:#}", err)
    }
}
