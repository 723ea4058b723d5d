//! MCP response envelopes.
//!
//! Every tool returns one of these envelopes serialized to JSON: a queued
//! task, a task status, inline content, an error, or a health report. The
//! envelope carries a UTC timestamp and the tracing request id so a client
//! can correlate tool output with server logs.

use crate::health::SystemHealth;
use chrono::{DateTime, Utc};
use qolaba_mcp_models::{TaskState, TaskStatusResponse, ValidationErrors};
use serde::Serialize;
use serde_json::{json, Value};

/// Standardized status values across envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl From<TaskState> for ResponseStatus {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Pending => ResponseStatus::Pending,
            TaskState::Running => ResponseStatus::InProgress,
            TaskState::Completed => ResponseStatus::Completed,
            TaskState::Failed => ResponseStatus::Failed,
            TaskState::Cancelled => ResponseStatus::Failed,
        }
    }
}

/// A queued, task-based operation (image generation, TTS, ...).
#[derive(Debug, Clone, Serialize)]
pub struct TaskEnvelope {
    pub success: bool,
    pub response_type: &'static str,
    pub task_id: String,
    pub status: ResponseStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<u64>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Status of a previously queued task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusEnvelope {
    pub success: bool,
    pub response_type: &'static str,
    pub task_id: String,
    pub status: ResponseStatus,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_remaining: Option<u64>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Direct content (chat responses, inline results).
#[derive(Debug, Clone, Serialize)]
pub struct ContentEnvelope {
    pub success: bool,
    pub response_type: &'static str,
    pub content: Value,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// An error surfaced to the MCP client.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub response_type: &'static str,
    pub error_code: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            response_type: "error",
            error_code: error_code.into(),
            error_message: error_message.into(),
            error_details: None,
            suggestions: None,
            timestamp: Utc::now(),
            request_id: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.error_details = Some(details);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Health report envelope.
#[derive(Debug, Clone, Serialize)]
pub struct HealthEnvelope {
    pub success: bool,
    pub response_type: &'static str,
    pub status: String,
    pub components: Value,
    pub uptime: f64,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Any envelope a tool can return.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum McpEnvelope {
    Task(TaskEnvelope),
    TaskStatus(TaskStatusEnvelope),
    Content(ContentEnvelope),
    Error(ErrorEnvelope),
    Health(HealthEnvelope),
}

impl From<ErrorEnvelope> for McpEnvelope {
    fn from(envelope: ErrorEnvelope) -> Self {
        McpEnvelope::Error(envelope)
    }
}

impl McpEnvelope {
    /// A queued task acknowledgment.
    pub fn task(
        task_id: impl Into<String>,
        status: ResponseStatus,
        operation: &str,
        request_id: Option<String>,
    ) -> Self {
        McpEnvelope::Task(TaskEnvelope {
            success: true,
            response_type: "task_created",
            task_id: task_id.into(),
            status,
            message: format!(
                "{operation} operation started. Use task_status to check progress."
            ),
            estimated_completion: None,
            timestamp: Utc::now(),
            request_id,
        })
    }

    /// A task status report.
    pub fn task_status(status: TaskStatusResponse, request_id: Option<String>) -> Self {
        McpEnvelope::TaskStatus(TaskStatusEnvelope {
            success: status.status != TaskState::Failed,
            response_type: "task_status",
            task_id: status.task_id,
            status: status.status.into(),
            progress: status.progress.clamp(0.0, 100.0),
            result: status.result,
            error_details: status.error,
            estimated_remaining: status.estimated_time_remaining,
            timestamp: Utc::now(),
            request_id,
        })
    }

    /// Inline content.
    pub fn content(content: Value, metadata: Option<Value>, request_id: Option<String>) -> Self {
        let content_type = match &content {
            Value::Object(_) | Value::Array(_) => "json",
            _ => "text",
        };
        McpEnvelope::Content(ContentEnvelope {
            success: true,
            response_type: "content",
            content,
            content_type: content_type.to_string(),
            metadata,
            timestamp: Utc::now(),
            request_id,
        })
    }

    /// A validation failure, before any HTTP call was made.
    pub fn validation_error(errors: &ValidationErrors, request_id: Option<String>) -> Self {
        ErrorEnvelope::new("validation_error", errors.summary())
            .with_details(json!({ "violations": errors.0 }))
            .with_suggestions(vec![
                "Check your input parameters".to_string(),
                "Refer to the API documentation".to_string(),
            ])
            .with_request_id(request_id)
            .into()
    }

    /// A health report.
    pub fn health(health: &SystemHealth, request_id: Option<String>) -> Self {
        McpEnvelope::Health(HealthEnvelope {
            success: health.is_healthy(),
            response_type: "health",
            status: health.status.as_str().to_string(),
            components: serde_json::to_value(&health.components).unwrap_or(Value::Null),
            uptime: health.uptime_seconds,
            version: health.version.clone(),
            timestamp: Utc::now(),
            request_id,
        })
    }

    /// Whether this envelope reports success.
    pub fn is_success(&self) -> bool {
        match self {
            McpEnvelope::Task(e) => e.success,
            McpEnvelope::TaskStatus(e) => e.success,
            McpEnvelope::Content(e) => e.success,
            McpEnvelope::Error(e) => e.success,
            McpEnvelope::Health(e) => e.success,
        }
    }

    /// Serialize to a JSON value for the tool layer.
    pub fn into_value(self) -> Value {
        serde_json::to_value(&self).unwrap_or_else(|_| {
            json!({
                "success": false,
                "response_type": "error",
                "error_code": "serialization_error",
                "error_message": "failed to serialize response envelope"
            })
        })
    }
}

/// Shape a raw API body into the right envelope for an operation.
///
/// A `task_id` marks a queued task; `content`/`choices` mark inline content
/// with the remaining fields as metadata; anything else is wrapped verbatim
/// as JSON content.
pub fn shape_api_response(body: Value, operation: &str, request_id: Option<String>) -> McpEnvelope {
    let Value::Object(ref fields) = body else {
        return McpEnvelope::content(body, None, request_id);
    };

    if let Some(task_id) = fields.get("task_id").and_then(Value::as_str) {
        let status = fields
            .get("status")
            .and_then(Value::as_str)
            .map(TaskState::parse_lenient)
            .unwrap_or(TaskState::Pending);
        return McpEnvelope::task(task_id, status.into(), operation, request_id);
    }

    if fields.contains_key("content") || fields.contains_key("choices") {
        let content = fields
            .get("content")
            .or_else(|| fields.get("choices"))
            .cloned()
            .unwrap_or(Value::Null);
        let metadata: serde_json::Map<String, Value> = fields
            .iter()
            .filter(|(key, _)| key.as_str() != "content" && key.as_str() != "choices")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let metadata = (!metadata.is_empty()).then_some(Value::Object(metadata));
        return McpEnvelope::content(content, metadata, request_id);
    }

    McpEnvelope::content(body, None, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_task_response() {
        let envelope = shape_api_response(
            json!({"task_id": "t1", "status": "pending"}),
            "text_to_image",
            Some("rid".into()),
        );
        match envelope {
            McpEnvelope::Task(task) => {
                assert_eq!(task.task_id, "t1");
                assert_eq!(task.status, ResponseStatus::Pending);
                assert!(task.message.contains("text_to_image"));
                assert_eq!(task.request_id.as_deref(), Some("rid"));
            }
            other => panic!("expected task envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_shape_content_with_metadata() {
        let envelope = shape_api_response(
            json!({"choices": [{"text": "hi"}], "model": "gpt-4"}),
            "chat",
            None,
        );
        match envelope {
            McpEnvelope::Content(content) => {
                assert_eq!(content.content_type, "json");
                assert_eq!(content.metadata, Some(json!({"model": "gpt-4"})));
            }
            other => panic!("expected content envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_shape_plain_body_wraps_as_content() {
        let envelope = shape_api_response(json!({"anything": 1}), "chat", None);
        assert!(matches!(envelope, McpEnvelope::Content(_)));
        assert!(envelope.is_success());
    }

    #[test]
    fn test_text_content_type() {
        let envelope = McpEnvelope::content(json!("plain words"), None, None);
        match envelope {
            McpEnvelope::Content(content) => assert_eq!(content.content_type, "text"),
            other => panic!("expected content envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_error_envelope() {
        use qolaba_mcp_models::{ValidationError, ValidationErrors};
        let errors = ValidationErrors(vec![ValidationError::new(
            "width",
            "range",
            "width must be between 64 and 2048",
        )]);
        let envelope = McpEnvelope::validation_error(&errors, None);
        assert!(!envelope.is_success());
        let value = envelope.into_value();
        assert_eq!(value["error_code"], "validation_error");
        assert_eq!(value["error_details"]["violations"][0]["field"], "width");
    }

    #[test]
    fn test_task_status_failed_is_not_success() {
        let status = TaskStatusResponse {
            task_id: "t1".into(),
            status: TaskState::Failed,
            progress: 130.0,
            result: None,
            error: Some("boom".into()),
            estimated_time_remaining: None,
        };
        let envelope = McpEnvelope::task_status(status, None);
        assert!(!envelope.is_success());
        let value = envelope.into_value();
        // Progress is clamped into range.
        assert_eq!(value["progress"], 100.0);
        assert_eq!(value["status"], "failed");
    }
}
