use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::RetryService;
use crate::error::MonitorError;
use crate::monitor::data_source::RunTable;
use crate::monitor::types::{RetryStrategy, RunRow, RunStatus};

/// Whether the table may offer a retry for this row.
pub fn is_retry_eligible(row: &RunRow) -> bool {
    row.current_status().is_retryable()
}

/// Retries runs and marks them running ahead of the server.
///
/// The remote call is fire-and-forget. A failed dispatch is reported on the
/// error channel but the optimistic `RUNNING` row is left in place; the next
/// page fetch replaces it with whatever the server says.
pub struct RetryController {
    service: Arc<dyn RetryService>,
    table: RunTable,
    errors: broadcast::Sender<MonitorError>,
}

impl RetryController {
    pub fn new(
        service: Arc<dyn RetryService>,
        table: RunTable,
        errors: broadcast::Sender<MonitorError>,
    ) -> Self {
        Self {
            service,
            table,
            errors,
        }
    }

    /// Retry a run on the current page.
    ///
    /// Returns as soon as the row shows `RUNNING`; the returned handle resolves
    /// when the remote call does, and can be ignored.
    pub fn retry(
        &self,
        run_id: &str,
        strategy: RetryStrategy,
    ) -> Result<JoinHandle<()>, MonitorError> {
        let status = self
            .table
            .status_of(run_id)
            .ok_or_else(|| MonitorError::UnknownRun(run_id.to_string()))?;
        if !status.is_retryable() {
            return Err(MonitorError::RetryNotAllowed {
                run_id: run_id.to_string(),
                status,
            });
        }

        info!(run_id = %run_id, strategy = %strategy, "Retrying run");
        let service = self.service.clone();
        let errors = self.errors.clone();
        let id = run_id.to_string();
        let handle = tokio::spawn(async move {
            if let Err(err) = service.retry(&id, strategy).await {
                let error = MonitorError::RetryDispatch {
                    run_id: id.clone(),
                    message: MonitorError::describe(&err),
                };
                warn!(run_id = %id, error = %error, "Retry dispatch failed");
                let _ = errors.send(error);
            }
        });

        self.table.set_optimistic(run_id, RunStatus::Running);
        Ok(handle)
    }
}
