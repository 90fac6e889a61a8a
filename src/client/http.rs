use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::client::{PreferenceStore, RetryService, RunFeed};
use crate::monitor::types::*;

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_S: f64 = 30.0;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProjectRequest {
    notify_status: NotificationStatus,
}

/// Client for the platform REST API.
///
/// Project reads and writes feed a local mirror per project, which is what
/// [`PreferenceStore::changes`] observes. Call [`ApiClient::refresh_project`]
/// to pick up changes made elsewhere.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    mirrors: Mutex<HashMap<String, watch::Sender<Option<Project>>>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout_s: f64) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(timeout_s)
            .with_context(|| format!("Invalid timeout: {}", timeout_s))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            mirrors: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn mirror(&self, project_id: &str) -> watch::Sender<Option<Project>> {
        self.mirrors
            .lock()
            .entry(project_id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .clone()
    }

    fn observe(&self, project: &Project) {
        self.mirror(&project.id).send_if_modified(|current| {
            if current.as_ref() == Some(project) {
                return false;
            }
            *current = Some(project.clone());
            true
        });
    }

    /// Re-read a project so external changes reach subscribers.
    pub async fn refresh_project(&self, project_id: &str) -> Result<Project> {
        self.read(project_id).await
    }
}

#[async_trait]
impl RunFeed for ApiClient {
    async fn fetch_page(
        &self,
        project: &ProjectContext,
        filter: &FilterState,
        request: &PageRequest,
    ) -> Result<SeekPage<Run>> {
        let mut query: Vec<(&str, String)> = vec![
            ("projectId", project.project_id.clone()),
            ("limit", request.limit.to_string()),
        ];
        if let Some(status) = filter.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(cursor) = &request.cursor {
            query.push(("cursor", cursor.clone()));
        }
        debug!(query = ?query, "GET /v1/flow-runs");

        let page = self
            .client
            .get(self.url("/v1/flow-runs"))
            .query(&query)
            .send()
            .await
            .context("Failed to reach run feed")?
            .error_for_status()
            .context("Run feed returned an error")?
            .json::<SeekPage<Run>>()
            .await
            .context("Failed to parse run page")?;
        Ok(page)
    }
}

#[async_trait]
impl PreferenceStore for ApiClient {
    async fn read(&self, project_id: &str) -> Result<Project> {
        let project = self
            .client
            .get(self.url(&format!("/v1/projects/{}", project_id)))
            .send()
            .await
            .with_context(|| format!("Failed to fetch project {}", project_id))?
            .error_for_status()
            .with_context(|| format!("Project {} lookup failed", project_id))?
            .json::<Project>()
            .await
            .context("Failed to parse project")?;
        self.observe(&project);
        Ok(project)
    }

    async fn write(&self, project_id: &str, setting: NotificationStatus) -> Result<Project> {
        let project = self
            .client
            .post(self.url(&format!("/v1/projects/{}", project_id)))
            .json(&UpdateProjectRequest {
                notify_status: setting,
            })
            .send()
            .await
            .with_context(|| format!("Failed to update project {}", project_id))?
            .error_for_status()
            .with_context(|| format!("Project {} update rejected", project_id))?
            .json::<Project>()
            .await
            .context("Failed to parse project")?;
        self.observe(&project);
        Ok(project)
    }

    fn changes(&self, project_id: &str) -> watch::Receiver<Option<Project>> {
        self.mirror(project_id).subscribe()
    }
}

#[async_trait]
impl RetryService for ApiClient {
    async fn retry(&self, run_id: &str, strategy: RetryStrategy) -> Result<()> {
        self.client
            .post(self.url(&format!("/v1/flow-runs/{}/retry", run_id)))
            .query(&[("strategy", strategy.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to retry run {}", run_id))?
            .error_for_status()
            .with_context(|| format!("Retry of run {} rejected", run_id))?;
        Ok(())
    }
}
