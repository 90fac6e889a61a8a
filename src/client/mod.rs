pub mod http;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

use crate::monitor::types::*;

/// Source of run pages for a project.
#[async_trait]
pub trait RunFeed: Send + Sync {
    async fn fetch_page(
        &self,
        project: &ProjectContext,
        filter: &FilterState,
        request: &PageRequest,
    ) -> Result<SeekPage<Run>>;
}

/// Persisted project settings.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn read(&self, project_id: &str) -> Result<Project>;

    async fn write(&self, project_id: &str, setting: NotificationStatus) -> Result<Project>;

    /// Latest known state of the project, updated by reads, writes and
    /// external changes. `None` until something has been observed.
    fn changes(&self, project_id: &str) -> watch::Receiver<Option<Project>>;
}

/// Re-execution of finished runs.
#[async_trait]
pub trait RetryService: Send + Sync {
    async fn retry(&self, run_id: &str, strategy: RetryStrategy) -> Result<()>;
}
