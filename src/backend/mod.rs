use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::PredictionId;
use crate::tasks::record::{TaskKind, TaskStatus};

pub mod http;

/// One task as the backend reports it. `initial_data` is the submission body
/// echoed back; the only field the client relies on is its `hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTaskInfo {
    #[serde(rename = "initialData")]
    pub initial_data: Value,
    pub status: TaskStatus,
}

impl RemoteTaskInfo {
    pub fn hash(&self) -> Option<&str> {
        self.initial_data.get("hash").and_then(|v| v.as_str())
    }
}

/// Response of the task listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskListing {
    pub tasks: Vec<RemoteTaskInfo>,
}

impl TaskListing {
    pub fn find_by_hash(&self, hash: &str) -> Option<&RemoteTaskInfo> {
        self.tasks.iter().find(|t| t.hash() == Some(hash))
    }

    /// Count of tasks still waiting or executing, used for the cosmetic
    /// in-queue annotation. Best-effort: it reflects this snapshot only.
    pub fn pending_count(&self) -> u32 {
        self.tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Queued | TaskStatus::Running))
            .count() as u32
    }
}

/// Narrow contract towards the remote compute service. The service accepts a
/// submission, lists tasks per prediction, and serves result files; it is a
/// black box beyond that.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Submit a task. The body must carry the fingerprint under `hash`.
    async fn post_task(
        &self,
        prediction: &PredictionId,
        kind: TaskKind,
        body: Value,
    ) -> Result<Value>;

    /// Current task listing for the prediction and kind.
    async fn list_tasks(&self, prediction: &PredictionId, kind: TaskKind) -> Result<TaskListing>;

    /// Result payload of a terminal-successful task.
    async fn fetch_result(
        &self,
        prediction: &PredictionId,
        kind: TaskKind,
        hash: &str,
    ) -> Result<Value>;
}
