use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of computations the system knows about.
/// Docking and Tunnels run on the remote worker pool; Volume runs in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Docking,
    Tunnels,
    Volume,
}

impl TaskKind {
    /// Kinds that have a remote component and therefore get polled.
    pub const SERVER_KINDS: [TaskKind; 2] = [TaskKind::Docking, TaskKind::Tunnels];

    pub fn is_remote(&self) -> bool {
        matches!(self, TaskKind::Docking | TaskKind::Tunnels)
    }

    /// Stable lowercase tag, used in fingerprints and backend routes.
    pub fn tag(&self) -> &'static str {
        match self {
            TaskKind::Docking => "docking",
            TaskKind::Tunnels => "tunnels",
            TaskKind::Volume => "volume",
        }
    }

    /// Human-readable name shown in listings.
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Docking => "Docking",
            TaskKind::Tunnels => "MOLE 2.5 tunnels",
            TaskKind::Volume => "Volume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Successful,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Successful | TaskStatus::Failed)
    }

    /// Forward-only transition check: queued -> {running, failed},
    /// running -> {successful, failed}, terminal -> nothing.
    /// queued -> successful is also allowed; a fast task can finish
    /// between two polls.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            TaskStatus::Queued => next != TaskStatus::Queued,
            TaskStatus::Running => matches!(next, TaskStatus::Successful | TaskStatus::Failed),
            TaskStatus::Successful | TaskStatus::Failed => false,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Successful => "successful",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A task submitted to the remote worker pool.
/// `created` is the local primary key; there is no separate numeric id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerTaskRecord {
    pub kind: TaskKind,
    /// User-supplied label, not used for matching.
    pub name: String,
    /// 1-based pocket rank.
    pub pocket: u32,
    /// Ordered task parameters, part of the fingerprint.
    pub params: Vec<String>,
    pub created: DateTime<Utc>,
    pub status: TaskStatus,
    /// Informational count of tasks ahead in the backend queue while this one
    /// is queued. Display-only, never part of the canonical status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    /// Result payload, set exactly once at the transition to successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ServerTaskRecord {
    /// Status string as shown to the user, with the in-queue annotation.
    pub fn display_status(&self) -> String {
        match (self.status, self.queue_position) {
            (TaskStatus::Queued, Some(n)) => format!("queued ({} in queue)", n),
            (status, _) => status.to_string(),
        }
    }
}

/// A computation that ran entirely in-process; no queued state, the value is
/// present from the moment the record exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientTaskRecord {
    pub kind: TaskKind,
    pub pocket: u32,
    pub created: DateTime<Utc>,
    pub value: Value,
}

/// Stored task record, tagged the way the collections persist it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "discriminator", rename_all = "lowercase")]
pub enum TaskRecord {
    Server(ServerTaskRecord),
    Client(ClientTaskRecord),
}

impl TaskRecord {
    pub fn created(&self) -> DateTime<Utc> {
        match self {
            TaskRecord::Server(r) => r.created,
            TaskRecord::Client(r) => r.created,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRecord::Server(r) => r.kind,
            TaskRecord::Client(r) => r.kind,
        }
    }

    pub fn pocket(&self) -> u32 {
        match self {
            TaskRecord::Server(r) => r.pocket,
            TaskRecord::Client(r) => r.pocket,
        }
    }

    pub fn as_server(&self) -> Option<&ServerTaskRecord> {
        match self {
            TaskRecord::Server(r) => Some(r),
            TaskRecord::Client(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_accept_nothing() {
        for next in [
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Successful,
            TaskStatus::Failed,
        ] {
            assert!(!TaskStatus::Successful.can_transition_to(next));
            assert!(!TaskStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn running_cannot_go_back_to_queued() {
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Queued));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Successful));
    }

    #[test]
    fn queue_annotation_is_cosmetic() {
        let record = ServerTaskRecord {
            kind: TaskKind::Docking,
            name: "test".into(),
            pocket: 1,
            params: vec!["c1ccccc1".into(), "32".into()],
            created: Utc::now(),
            status: TaskStatus::Queued,
            queue_position: Some(3),
            result: None,
        };
        assert_eq!(record.display_status(), "queued (3 in queue)");
        assert_eq!(record.status, TaskStatus::Queued);
    }

    #[test]
    fn record_roundtrips_with_discriminator() {
        let record = TaskRecord::Client(ClientTaskRecord {
            kind: TaskKind::Volume,
            pocket: 2,
            created: Utc::now(),
            value: serde_json::json!(1234.5),
        });
        let text = serde_json::to_string(&record).unwrap();
        assert!(text.contains("\"discriminator\":\"client\""));
        let back: TaskRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }
}
