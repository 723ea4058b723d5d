//! Operation orchestration.
//!
//! One pipeline for every tool: validate the raw payload against its
//! schema model, POST the validated body to the operation's endpoint, and
//! shape the API's answer into an MCP envelope. Client errors never
//! propagate out of here; they become error envelopes.

use crate::metrics::MetricsCollector;
use crate::responses::{shape_api_response, ErrorEnvelope, McpEnvelope};
use qolaba_mcp_client::{ApiClient, ApiClientError, CallOptions, Method, ParsedBody, RequestBody};
use qolaba_mcp_models::{
    validate_payload, ChatRequest, ImageToImageRequest, InpaintingRequest,
    ReplaceBackgroundRequest, TaskStatusResponse, TextToImageRequest, TextToSpeechRequest,
    Validate, ValidationError, ValidationErrors, VectorStoreRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Operations exposed as MCP tools. Task status polling has its own entry
/// point since it is a GET with a path parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    TextToImage,
    ImageToImage,
    Inpainting,
    ReplaceBackground,
    TextToSpeech,
    Chat,
    StoreVectorDb,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::TextToImage,
        Operation::ImageToImage,
        Operation::Inpainting,
        Operation::ReplaceBackground,
        Operation::TextToSpeech,
        Operation::Chat,
        Operation::StoreVectorDb,
    ];

    /// API endpoint path for this operation.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Operation::TextToImage => "text-to-image",
            Operation::ImageToImage => "image-to-image",
            Operation::Inpainting => "inpainting",
            Operation::ReplaceBackground => "replace-background",
            Operation::TextToSpeech => "text-to-speech",
            Operation::Chat => "chat",
            Operation::StoreVectorDb => "store-file-in-vector-database",
        }
    }

    /// Tool name for MCP registration.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Operation::TextToImage => "text_to_image",
            Operation::ImageToImage => "image_to_image",
            Operation::Inpainting => "inpainting",
            Operation::ReplaceBackground => "replace_background",
            Operation::TextToSpeech => "text_to_speech",
            Operation::Chat => "chat",
            Operation::StoreVectorDb => "store_vector_db",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Operation> {
        Operation::ALL.iter().copied().find(|op| op.tool_name() == name)
    }
}

/// Validates, calls and shapes; the single entry point for tools.
pub struct Orchestrator {
    client: Arc<ApiClient>,
    metrics: Arc<MetricsCollector>,
}

impl Orchestrator {
    pub fn new(client: Arc<ApiClient>, metrics: Arc<MetricsCollector>) -> Self {
        Self { client, metrics }
    }

    /// Execute one operation end to end. Always returns an envelope.
    pub async fn execute(
        &self,
        operation: Operation,
        payload: Value,
        request_id: Option<String>,
    ) -> McpEnvelope {
        let started = Instant::now();
        let request_id = Some(request_id.unwrap_or_else(|| Uuid::new_v4().to_string()));

        info!(
            operation = operation.tool_name(),
            request_id = request_id.as_deref().unwrap_or(""),
            "executing operation"
        );

        let body = match validate_operation(operation, &payload) {
            Ok(body) => body,
            Err(errors) => {
                self.record(operation, started, false);
                return McpEnvelope::validation_error(&errors, request_id);
            }
        };

        let opts = CallOptions {
            request_id: request_id.clone(),
            ..Default::default()
        };
        let result = self
            .client
            .call(Method::POST, operation.endpoint(), RequestBody::Json(body), opts)
            .await;

        let envelope = match result {
            Ok(response) => match response.body {
                ParsedBody::Json(value) => {
                    shape_api_response(value, operation.tool_name(), request_id)
                }
                _ => unexpected_format_envelope(request_id),
            },
            Err(err) => {
                error!(
                    operation = operation.tool_name(),
                    error = %err,
                    "operation failed"
                );
                client_error_envelope(&err, request_id)
            }
        };

        self.record(operation, started, envelope.is_success());
        envelope
    }

    /// Poll the status of a queued task.
    pub async fn task_status(&self, task_id: &str, request_id: Option<String>) -> McpEnvelope {
        let started = Instant::now();
        let request_id = Some(request_id.unwrap_or_else(|| Uuid::new_v4().to_string()));
        let opts = CallOptions {
            request_id: request_id.clone(),
            ..Default::default()
        };

        let result = self
            .client
            .call(
                Method::GET,
                &format!("task-status/{task_id}"),
                RequestBody::None,
                opts,
            )
            .await;

        let envelope = match result {
            Ok(response) => match &response.body {
                ParsedBody::Json(value) => {
                    match serde_json::from_value::<TaskStatusResponse>(value.clone()) {
                        Ok(status) => McpEnvelope::task_status(status, request_id),
                        Err(_) => unexpected_format_envelope(request_id),
                    }
                }
                _ => unexpected_format_envelope(request_id),
            },
            Err(err) => client_error_envelope(&err, request_id),
        };

        self.metrics.record_mcp_operation(
            "task_status",
            started.elapsed().as_secs_f64(),
            envelope.is_success(),
        );
        envelope
    }

    fn record(&self, operation: Operation, started: Instant, success: bool) {
        self.metrics.record_mcp_operation(
            operation.tool_name(),
            started.elapsed().as_secs_f64(),
            success,
        );
    }
}

/// Validate a raw payload against the operation's schema model and re-encode
/// it as the request body (optionals the caller left unset are dropped).
fn validate_operation(operation: Operation, payload: &Value) -> Result<Value, ValidationErrors> {
    match operation {
        Operation::TextToImage => encode::<TextToImageRequest>(payload),
        Operation::ImageToImage => encode::<ImageToImageRequest>(payload),
        Operation::Inpainting => encode::<InpaintingRequest>(payload),
        Operation::ReplaceBackground => encode::<ReplaceBackgroundRequest>(payload),
        Operation::TextToSpeech => encode::<TextToSpeechRequest>(payload),
        Operation::Chat => encode::<ChatRequest>(payload),
        Operation::StoreVectorDb => encode::<VectorStoreRequest>(payload),
    }
}

fn encode<T>(payload: &Value) -> Result<Value, ValidationErrors>
where
    T: DeserializeOwned + Serialize + Validate,
{
    let model: T = validate_payload(payload)?;
    serde_json::to_value(&model).map_err(|err| {
        ValidationErrors(vec![ValidationError::new(
            "payload",
            "encode",
            err.to_string(),
        )])
    })
}

fn client_error_envelope(err: &ApiClientError, request_id: Option<String>) -> McpEnvelope {
    ErrorEnvelope::new("api_client_error", format!("API request failed: {err}"))
        .with_details(json!({ "status_code": err.status() }))
        .with_request_id(request_id)
        .into()
}

fn unexpected_format_envelope(request_id: Option<String>) -> McpEnvelope {
    ErrorEnvelope::new(
        "unexpected_response_format",
        "Received unexpected response format from API",
    )
    .with_request_id(request_id)
    .into()
}
