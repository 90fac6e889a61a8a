use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::client::{PreferenceStore, RetryService, RunFeed};
use crate::monitor::types::*;

/// In-memory platform backing all three collaborators.
/// Cursors are decimal offsets into the filtered run list.
pub struct MemoryPlatform {
    runs: Mutex<Vec<Run>>,
    projects: Mutex<HashMap<String, watch::Sender<Option<Project>>>>,
    fetches: Mutex<Vec<(FilterState, PageRequest)>>,
    writes: Mutex<Vec<(String, NotificationStatus)>>,
    retries: Mutex<Vec<(String, RetryStrategy)>>,
    fail_fetches: AtomicBool,
    fail_writes: AtomicBool,
    fail_retries: AtomicBool,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            runs: Mutex::new(Vec::new()),
            projects: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            retries: Mutex::new(Vec::new()),
            fail_fetches: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_retries: AtomicBool::new(false),
        }
    }

    pub fn with_runs(runs: Vec<Run>) -> Self {
        let platform = Self::new();
        *platform.runs.lock() = runs;
        platform
    }

    pub fn insert_project(&self, project: Project) {
        let id = project.id.clone();
        self.sender(&id).send_replace(Some(project));
    }

    /// Simulate a change made by another session.
    pub fn set_external_notify_status(&self, project_id: &str, status: NotificationStatus) {
        self.sender(project_id).send_modify(|p| {
            if let Some(project) = p {
                project.notify_status = status;
            }
        });
    }

    /// Overwrite a run's server-side status.
    pub fn set_run_status(&self, run_id: &str, status: RunStatus) {
        if let Some(run) = self.runs.lock().iter_mut().find(|r| r.id == run_id) {
            run.status = status;
        }
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_retries(&self, fail: bool) {
        self.fail_retries.store(fail, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> Vec<(FilterState, PageRequest)> {
        self.fetches.lock().clone()
    }

    pub fn writes(&self) -> Vec<(String, NotificationStatus)> {
        self.writes.lock().clone()
    }

    pub fn retries(&self) -> Vec<(String, RetryStrategy)> {
        self.retries.lock().clone()
    }

    fn sender(&self, project_id: &str) -> watch::Sender<Option<Project>> {
        self.projects
            .lock()
            .entry(project_id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .clone()
    }
}

#[async_trait]
impl RunFeed for MemoryPlatform {
    async fn fetch_page(
        &self,
        _project: &ProjectContext,
        filter: &FilterState,
        request: &PageRequest,
    ) -> Result<SeekPage<Run>> {
        self.fetches.lock().push((*filter, request.clone()));
        if self.fail_fetches.load(Ordering::SeqCst) {
            bail!("run feed unavailable");
        }

        let matching: Vec<Run> = self
            .runs
            .lock()
            .iter()
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();

        let offset = match &request.cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("Invalid cursor: {}", c))?,
            None => 0,
        };
        let limit = request.limit.max(1);
        let end = (offset + limit).min(matching.len());
        let data = matching.get(offset..end).map(<[Run]>::to_vec).unwrap_or_default();

        let next = (end < matching.len()).then(|| end.to_string());
        let previous = (offset > 0).then(|| offset.saturating_sub(limit).to_string());
        Ok(SeekPage::new(data, next, previous))
    }
}

#[async_trait]
impl PreferenceStore for MemoryPlatform {
    async fn read(&self, project_id: &str) -> Result<Project> {
        let project = self.sender(project_id).borrow().clone();
        project.ok_or_else(|| anyhow::anyhow!("Project not found: {}", project_id))
    }

    async fn write(&self, project_id: &str, setting: NotificationStatus) -> Result<Project> {
        self.writes.lock().push((project_id.to_string(), setting));
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("project service rejected the update");
        }

        let sender = self.sender(project_id);
        let mut updated = None;
        sender.send_if_modified(|p| match p {
            Some(project) => {
                let changed = project.notify_status != setting;
                project.notify_status = setting;
                updated = Some(project.clone());
                changed
            }
            None => false,
        });
        updated.ok_or_else(|| anyhow::anyhow!("Project not found: {}", project_id))
    }

    fn changes(&self, project_id: &str) -> watch::Receiver<Option<Project>> {
        self.sender(project_id).subscribe()
    }
}

#[async_trait]
impl RetryService for MemoryPlatform {
    async fn retry(&self, run_id: &str, strategy: RetryStrategy) -> Result<()> {
        self.retries.lock().push((run_id.to_string(), strategy));
        if self.fail_retries.load(Ordering::SeqCst) {
            bail!("execution service unavailable");
        }
        let mut runs = self.runs.lock();
        let Some(run) = runs.iter_mut().find(|r| r.id == run_id) else {
            bail!("Run not found: {}", run_id);
        };
        run.status = RunStatus::Running;
        Ok(())
    }
}
