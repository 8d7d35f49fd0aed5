//! Bookkeeping for runs started through the API.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use common::{Method, OperationResult, RunId};
use saga::RunOutcome;
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Latest known state of one workflow.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub workflow_id: String,
    pub run_id: RunId,
    pub method: Method,
    pub status: RunStatus,
    pub result: Option<OperationResult>,
    pub error: Option<String>,
}

/// Runs keyed by workflow id.
///
/// A workflow id may be reused once its previous run has finished; the new
/// run replaces the old record. Running records are always kept, finished
/// ones are evicted oldest first once more than `capacity` of them are held.
#[derive(Debug, Clone)]
pub struct RunRegistry {
    inner: Arc<RwLock<Inner>>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, RunRecord>,
    finished: VecDeque<(String, RunId)>,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl RunRegistry {
    /// Finished runs kept by default.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            capacity,
        }
    }

    /// Records a new run. Returns `false` if `workflow_id` is still running.
    pub async fn start(&self, workflow_id: &str, run_id: RunId, method: Method) -> bool {
        let mut inner = self.inner.write().await;
        if inner
            .records
            .get(workflow_id)
            .is_some_and(|r| r.status == RunStatus::Running)
        {
            return false;
        }

        inner.records.insert(
            workflow_id.to_string(),
            RunRecord {
                workflow_id: workflow_id.to_string(),
                run_id,
                method,
                status: RunStatus::Running,
                result: None,
                error: None,
            },
        );
        true
    }

    /// Stores the outcome of a finished run.
    pub async fn finish(&self, workflow_id: &str, outcome: &RunOutcome) {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.records.get_mut(workflow_id) else {
            return;
        };
        if record.run_id != outcome.run_id {
            return;
        }

        record.status = if outcome.is_success() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        record.result = Some(outcome.result.clone());
        record.error = outcome.error.as_ref().map(ToString::to_string);

        inner
            .finished
            .push_back((workflow_id.to_string(), outcome.run_id));
        while inner.finished.len() > self.capacity {
            let Some((evicted, run_id)) = inner.finished.pop_front() else {
                break;
            };
            // Skip entries whose workflow id has since been reused.
            if inner
                .records
                .get(&evicted)
                .is_some_and(|r| r.run_id == run_id && r.status != RunStatus::Running)
            {
                inner.records.remove(&evicted);
            }
        }
    }

    pub async fn get(&self, workflow_id: &str) -> Option<RunRecord> {
        self.inner.read().await.records.get(workflow_id).cloned()
    }

    /// Number of runs currently in flight.
    pub async fn running(&self) -> usize {
        self.inner
            .read()
            .await
            .records
            .values()
            .filter(|r| r.status == RunStatus::Running)
            .count()
    }
}
