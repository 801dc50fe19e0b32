//! Remote generation tasks
//!
//! Tasks are created by a submit call and mutated only by fresh status
//! fetched from the remote queue. The client never advances a status on
//! its own.

use crate::project::Metadata;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted, waiting for a worker
    Queued,
    /// Being generated
    Running,
    /// Finished with results
    Succeeded,
    /// Finished with an error
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl TaskStatus {
    /// Whether no further transition can occur
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generation task as reported by the remote queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTask {
    /// Server-assigned identifier
    pub task_id: String,
    /// Prompt as submitted
    pub prompt: String,
    /// Current status
    pub status: TaskStatus,
    /// Free-form server metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Result locations, populated on success
    #[serde(default)]
    pub result_uris: Vec<String>,
    /// Machine-readable failure code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Creation time (epoch ms)
    pub created_at: u64,
    /// Last status change (epoch ms)
    pub updated_at: u64,
}

impl GenerationTask {
    /// Whether the task has reached a terminal status
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn task_decodes_server_shape() {
        let raw = json!({
            "taskId": "t-1",
            "prompt": "future city",
            "status": "running",
            "metadata": { "model": "sdxl" },
            "resultUris": [],
            "createdAt": 10,
            "updatedAt": 12
        });
        let task: GenerationTask = serde_json::from_value(raw).unwrap();
        assert_eq!(task.task_id, "t-1");
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.metadata["model"], json!("sdxl"));
        assert!(task.error_message.is_none());
    }

    #[test]
    fn task_tolerates_missing_optional_fields() {
        let raw = json!({
            "taskId": "t-2",
            "prompt": "p",
            "status": "queued",
            "createdAt": 1,
            "updatedAt": 1
        });
        let task: GenerationTask = serde_json::from_value(raw).unwrap();
        assert!(task.result_uris.is_empty());
        assert!(task.metadata.is_empty());
    }

    #[test]
    fn status_display_matches_wire() {
        assert_eq!(TaskStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(
            serde_json::to_value(TaskStatus::Succeeded).unwrap(),
            json!("succeeded")
        );
    }
}
