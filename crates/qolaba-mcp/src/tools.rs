//! Tool registration.
//!
//! One MCP tool per API operation, plus task status polling and a health
//! check. Executors return envelopes as structured JSON; an envelope with
//! `success: false` is still an Ok tool result so the client can show the
//! model what went wrong.

use async_trait::async_trait;
use qolaba_mcp_core::{HealthService, McpEnvelope, Operation, Orchestrator};
use qolaba_mcp_protocol::{ToolBuilder, ToolExecutor, ToolRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

/// Executes one API operation through the orchestrator.
struct OperationTool {
    operation: Operation,
    orchestrator: Arc<Orchestrator>,
}

#[async_trait]
impl ToolExecutor for OperationTool {
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let envelope = self
            .orchestrator
            .execute(self.operation, args, None)
            .await;
        Ok(envelope.into_value())
    }
}

/// Polls the status of a queued task.
struct TaskStatusTool {
    orchestrator: Arc<Orchestrator>,
}

#[async_trait]
impl ToolExecutor for TaskStatusTool {
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let task_id = args
            .get("task_id")
            .and_then(Value::as_str)
            .ok_or_else(|| "task_id is required".to_string())?;
        let envelope = self.orchestrator.task_status(task_id, None).await;
        Ok(envelope.into_value())
    }
}

/// Reports aggregated system health.
struct HealthTool {
    health: Arc<HealthService>,
}

#[async_trait]
impl ToolExecutor for HealthTool {
    async fn execute(&self, _args: Value) -> Result<Value, String> {
        let health = self.health.status().await;
        Ok(McpEnvelope::health(&health, None).into_value())
    }
}

/// Build the full tool registry for the server.
pub fn build_registry(
    orchestrator: Arc<Orchestrator>,
    health: Arc<HealthService>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    for operation in Operation::ALL {
        registry.register(
            ToolBuilder::new(operation.tool_name())
                .description(description(operation))
                .input_schema(input_schema(operation))
                .build(OperationTool {
                    operation,
                    orchestrator: Arc::clone(&orchestrator),
                }),
        );
    }

    registry.register(
        ToolBuilder::new("task_status")
            .description("Check the status of a previously queued generation task")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "task_id": {"type": "string", "description": "Task identifier returned by a generation tool"}
                },
                "required": ["task_id"]
            }))
            .build(TaskStatusTool {
                orchestrator: Arc::clone(&orchestrator),
            }),
    );

    registry.register(
        ToolBuilder::new("health_check")
            .description("Report connectivity and configuration health of the bridge")
            .build(HealthTool { health }),
    );

    registry
}

fn description(operation: Operation) -> &'static str {
    match operation {
        Operation::TextToImage => "Generate an image from a text prompt",
        Operation::ImageToImage => "Transform an existing image guided by a text prompt",
        Operation::Inpainting => "Repaint a masked region of an image from a text prompt",
        Operation::ReplaceBackground => "Replace the background of an image from a text prompt",
        Operation::TextToSpeech => "Synthesize speech audio from text",
        Operation::Chat => "Run a chat completion",
        Operation::StoreVectorDb => "Store a file in a vector database collection",
    }
}

fn input_schema(operation: Operation) -> Value {
    match operation {
        Operation::TextToImage => json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "description": "Text description of the image"},
                "model": {"type": "string", "default": "flux"},
                "width": {"type": "integer", "minimum": 64, "maximum": 2048, "default": 512},
                "height": {"type": "integer", "minimum": 64, "maximum": 2048, "default": 512},
                "steps": {"type": "integer", "minimum": 1, "maximum": 100, "default": 20},
                "guidance_scale": {"type": "number", "minimum": 1.0, "maximum": 20.0, "default": 7.5},
                "seed": {"type": "integer", "minimum": 0},
                "negative_prompt": {"type": "string"}
            },
            "required": ["prompt"]
        }),
        Operation::ImageToImage => json!({
            "type": "object",
            "properties": {
                "image": {"type": "string", "description": "Source image URL or base64 data"},
                "prompt": {"type": "string"},
                "model": {"type": "string", "default": "flux"},
                "strength": {"type": "number", "minimum": 0.0, "maximum": 1.0, "default": 0.8},
                "steps": {"type": "integer", "minimum": 1, "maximum": 100, "default": 20},
                "guidance_scale": {"type": "number", "minimum": 1.0, "maximum": 20.0, "default": 7.5},
                "seed": {"type": "integer", "minimum": 0}
            },
            "required": ["image", "prompt"]
        }),
        Operation::Inpainting => json!({
            "type": "object",
            "properties": {
                "image": {"type": "string", "description": "Source image URL or base64 data"},
                "mask": {"type": "string", "description": "Mask image URL or base64 data"},
                "prompt": {"type": "string"},
                "model": {"type": "string", "default": "flux"},
                "steps": {"type": "integer", "minimum": 1, "maximum": 100, "default": 20},
                "guidance_scale": {"type": "number", "minimum": 1.0, "maximum": 20.0, "default": 7.5},
                "seed": {"type": "integer", "minimum": 0}
            },
            "required": ["image", "mask", "prompt"]
        }),
        Operation::ReplaceBackground => json!({
            "type": "object",
            "properties": {
                "image": {"type": "string", "description": "Source image URL or base64 data"},
                "prompt": {"type": "string", "description": "Description of the new background"},
                "model": {"type": "string", "default": "flux"},
                "steps": {"type": "integer", "minimum": 1, "maximum": 100, "default": 20},
                "guidance_scale": {"type": "number", "minimum": 1.0, "maximum": 20.0, "default": 7.5},
                "seed": {"type": "integer", "minimum": 0}
            },
            "required": ["image", "prompt"]
        }),
        Operation::TextToSpeech => json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "maxLength": 4000},
                "voice": {"type": "string", "enum": ["alloy", "echo", "fable", "onyx", "nova", "shimmer"], "default": "alloy"},
                "model": {"type": "string", "default": "tts-1"},
                "response_format": {"type": "string", "enum": ["mp3", "opus", "aac", "flac"], "default": "mp3"},
                "speed": {"type": "number", "minimum": 0.25, "maximum": 4.0, "default": 1.0}
            },
            "required": ["text"]
        }),
        Operation::Chat => json!({
            "type": "object",
            "properties": {
                "messages": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "role": {"type": "string", "enum": ["system", "user", "assistant"]},
                            "content": {"type": "string"}
                        },
                        "required": ["role", "content"]
                    }
                },
                "model": {"type": "string", "default": "gpt-4"},
                "max_tokens": {"type": "integer", "minimum": 1, "maximum": 4000},
                "temperature": {"type": "number", "minimum": 0.0, "maximum": 2.0, "default": 0.7},
                "top_p": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                "frequency_penalty": {"type": "number", "minimum": -2.0, "maximum": 2.0},
                "presence_penalty": {"type": "number", "minimum": -2.0, "maximum": 2.0}
            },
            "required": ["messages"]
        }),
        Operation::StoreVectorDb => json!({
            "type": "object",
            "properties": {
                "file": {"type": "string", "description": "File URL or path to store"},
                "collection_name": {"type": "string", "pattern": "^[a-zA-Z0-9_-]+$"},
                "metadata": {"type": "object"},
                "chunk_size": {"type": "integer", "minimum": 100, "maximum": 4000, "default": 1000},
                "chunk_overlap": {"type": "integer", "minimum": 0, "maximum": 1000, "default": 200}
            },
            "required": ["file", "collection_name"]
        }),
    }
}
