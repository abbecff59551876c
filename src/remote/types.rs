use serde::{Deserialize, Serialize};

/// Accept header selecting task-based export records
pub const EXPORT_ACCEPT: &str = "application/vnd.galaxy.task.export+json";

/// `GET /histories/{id}?view=summary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    #[serde(default)]
    pub id: String,
    pub archived: bool,
    pub purged: bool,
}

impl HistorySummary {
    pub fn new(id: &str, archived: bool, purged: bool) -> Self {
        Self {
            id: id.to_string(),
            archived,
            purged,
        }
    }

    /// Confirmed retired: exported, archived and its live data purged
    pub fn is_retired(&self) -> bool {
        self.archived && self.purged
    }
}

/// One entry of `GET /histories/{id}/exports`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: String,
    #[serde(default)]
    pub up_to_date: bool,
}

/// Body of `POST /histories/{id}/write_store`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub target_uri: String,
    pub model_store_format: String,
    pub include_files: bool,
    pub include_deleted: bool,
    pub include_hidden: bool,
}

/// Response of `POST /histories/{id}/write_store`; `id` is the task id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTask {
    pub id: String,
}

/// Body of `POST /histories/{id}/archive`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeRequest {
    pub archive_export_id: String,
    pub purge_history: bool,
}

impl PurgeRequest {
    pub fn purging(export_id: &str) -> Self {
        Self {
            archive_export_id: export_id.to_string(),
            purge_history: true,
        }
    }
}

/// State of an asynchronous export task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Success,
    Failure,
    /// Any other state the remote reports; treated as still running
    Other(String),
}

impl TaskState {
    /// Parse the `GET /tasks/{id}/state` body, a bare JSON string literal
    /// such as `"SUCCESS"`. Unquoted bodies are accepted as well.
    pub fn from_body(body: &str) -> Self {
        let trimmed = body.trim();
        let state = serde_json::from_str::<String>(trimmed)
            .unwrap_or_else(|_| trimmed.trim_matches('"').to_string());
        Self::from_name(&state)
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "PENDING" => TaskState::Pending,
            "SUCCESS" => TaskState::Success,
            "FAILURE" => TaskState::Failure,
            other => TaskState::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "PENDING"),
            TaskState::Success => write!(f, "SUCCESS"),
            TaskState::Failure => write!(f, "FAILURE"),
            TaskState::Other(s) => write!(f, "{}", s),
        }
    }
}
