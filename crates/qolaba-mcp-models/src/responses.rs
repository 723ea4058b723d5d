//! Response models for the Qolaba API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a queued generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }

    /// Parse a state string, defaulting to `Pending` for unknown values so a
    /// new upstream state doesn't break status polling.
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "running" | "processing" => TaskState::Running,
            "completed" | "succeeded" => TaskState::Completed,
            "failed" | "error" => TaskState::Failed,
            "cancelled" | "canceled" => TaskState::Cancelled,
            _ => TaskState::Pending,
        }
    }
}

/// Status of a generation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// Task identifier.
    pub task_id: String,
    /// Task state.
    pub status: TaskState,
    /// Progress percentage.
    #[serde(default)]
    pub progress: f64,
    /// Task result if completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Estimated seconds remaining.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<u64>,
}

/// Error payload the API returns alongside non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub error_code: String,
    /// Error message.
    pub message: String,
    /// Additional error details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Request identifier for support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}
