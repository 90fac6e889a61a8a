#![allow(dead_code)]

use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

use runwatch::client::RunFeed;
use runwatch::monitor::types::*;

pub fn run(id: &str, status: RunStatus) -> Run {
    Run {
        id: id.to_string(),
        flow_name: format!("flow-{}", id),
        status,
        started_at: None,
        finished_at: None,
    }
}

pub fn query(status: Option<&str>) -> QueryParams {
    let mut q = QueryParams::new();
    if let Some(s) = status {
        q.insert(STATUS_PARAM.to_string(), s.to_string());
    }
    q
}

/// Poll `cond` until it holds, failing the test after two seconds.
pub async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Wait for a published view matching `pred` and return a copy of it.
pub async fn wait_for_view(
    rx: &mut watch::Receiver<RunsView>,
    pred: impl Fn(&RunsView) -> bool,
) -> RunsView {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            {
                let view = rx.borrow_and_update();
                if pred(&view) {
                    return view.clone();
                }
            }
            rx.changed().await.expect("data source dropped");
        }
    })
    .await
    .expect("view not published in time")
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Run feed whose responses are released by the test, one per call.
#[derive(Default)]
pub struct GatedFeed {
    calls: Mutex<Vec<(FilterState, PageRequest)>>,
    gates: Mutex<Vec<Option<oneshot::Sender<Result<SeekPage<Run>, String>>>>>,
}

impl GatedFeed {
    pub fn calls(&self) -> Vec<(FilterState, PageRequest)> {
        self.calls.lock().clone()
    }

    /// Resolve call `index`. Returns `false` if nobody is waiting on it anymore.
    pub fn release(&self, index: usize, page: SeekPage<Run>) -> bool {
        self.resolve(index, Ok(page))
    }

    pub fn fail(&self, index: usize, message: &str) -> bool {
        self.resolve(index, Err(message.to_string()))
    }

    fn resolve(&self, index: usize, result: Result<SeekPage<Run>, String>) -> bool {
        let gate = self.gates.lock().get_mut(index).and_then(Option::take);
        match gate {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl RunFeed for GatedFeed {
    async fn fetch_page(
        &self,
        _project: &ProjectContext,
        filter: &FilterState,
        request: &PageRequest,
    ) -> Result<SeekPage<Run>> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().push((*filter, request.clone()));
        self.gates.lock().push(Some(tx));
        match rx.await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(message)) => bail!(message),
            Err(_) => bail!("gate dropped"),
        }
    }
}
