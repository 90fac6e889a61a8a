use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::PreferenceStore;
use crate::error::MonitorError;
use crate::monitor::signal::{Control, Subscription};
use crate::monitor::types::{Edition, NotificationStatus, Project};

/// Keeps the notification toggle and the project's stored setting in step.
///
/// Two one-way bindings meet at the toggle value: store emissions only seed
/// the toggle (silently), toggle edits only dispatch writes. `synced` holds
/// the value last known to agree on both sides, so a seed is never echoed
/// back as a write and an edit equal to it is dropped.
pub struct NotificationSync {
    edition: Option<Edition>,
    _edits: Subscription,
    watcher: JoinHandle<()>,
}

impl NotificationSync {
    pub async fn start(
        store: Arc<dyn PreferenceStore>,
        project_id: impl Into<String>,
        toggle: Control<bool>,
        errors: broadcast::Sender<MonitorError>,
    ) -> Self {
        let project_id = project_id.into();
        let synced: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
        let mut changes = store.changes(&project_id);

        let edition = match store.read(&project_id).await {
            Ok(project) => {
                let enabled = project.notify_status.is_enabled();
                debug!(project = %project_id, enabled, "Seeding notification toggle");
                toggle.seed(enabled);
                *synced.lock() = Some(enabled);
                Some(project.edition)
            }
            Err(err) => {
                let error = MonitorError::PreferenceRead(MonitorError::describe(&err));
                warn!(project = %project_id, error = %error, "Could not read project");
                let _ = errors.send(error);
                None
            }
        };
        let mut last_seen = changes
            .borrow_and_update()
            .as_ref()
            .map(|p| p.notify_status.is_enabled());
        if last_seen.is_none() {
            last_seen = *synced.lock();
        }

        let edits = {
            let store = store.clone();
            let synced = synced.clone();
            let project_id = project_id.clone();
            toggle.value_changes().subscribe(move |enabled: &bool| {
                let enabled = *enabled;
                {
                    let mut synced = synced.lock();
                    if *synced == Some(enabled) {
                        return;
                    }
                    *synced = Some(enabled);
                }
                dispatch(
                    store.clone(),
                    project_id.clone(),
                    enabled,
                    synced.clone(),
                    errors.clone(),
                );
            })
        };

        let watcher = tokio::spawn(watch_store(changes, toggle, synced, last_seen));

        Self {
            edition,
            _edits: edits,
            watcher,
        }
    }

    /// Edition reported by the project, if it could be read.
    pub fn edition(&self) -> Option<Edition> {
        self.edition
    }
}

impl Drop for NotificationSync {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

fn dispatch(
    store: Arc<dyn PreferenceStore>,
    project_id: String,
    enabled: bool,
    synced: Arc<Mutex<Option<bool>>>,
    errors: broadcast::Sender<MonitorError>,
) {
    let setting = NotificationStatus::from_enabled(enabled);
    info!(project = %project_id, setting = ?setting, "Updating notification setting");
    tokio::spawn(async move {
        if let Err(err) = store.write(&project_id, setting).await {
            let error = MonitorError::PreferenceWrite(MonitorError::describe(&err));
            warn!(project = %project_id, error = %error, "Notification update failed");
            // The toggle keeps the user's value; the next edit is always sent.
            let mut synced = synced.lock();
            if *synced == Some(enabled) {
                *synced = None;
            }
            drop(synced);
            let _ = errors.send(error);
        }
    });
}

async fn watch_store(
    mut changes: watch::Receiver<Option<Project>>,
    toggle: Control<bool>,
    synced: Arc<Mutex<Option<bool>>>,
    mut last_seen: Option<bool>,
) {
    while changes.changed().await.is_ok() {
        let enabled = match changes.borrow_and_update().as_ref() {
            Some(project) => project.notify_status.is_enabled(),
            None => continue,
        };
        if last_seen == Some(enabled) {
            continue;
        }
        last_seen = Some(enabled);
        debug!(enabled, "Project setting changed, reseeding toggle");
        toggle.seed(enabled);
        *synced.lock() = Some(enabled);
    }
}
