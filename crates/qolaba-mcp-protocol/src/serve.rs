//! MCP server loop over stdio.
//!
//! Line-delimited JSON-RPC: one request per line on stdin, one response per
//! line on stdout. Malformed input is logged and skipped; a failing tool
//! returns an `is_error` tool result, not a protocol error, so the client
//! can surface it to the model.

use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolCallResult, ToolsCapability,
    INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PROTOCOL_VERSION,
};
use crate::registry::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Result type for serve operations.
pub type ServeResult<T> = Result<T, ServeError>;

/// Errors that can take the serve loop down.
#[derive(Debug, Error)]
pub enum ServeError {
    /// IO error on stdin/stdout.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Response serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identity advertised during the MCP handshake.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: "qolaba-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Serve the registry over stdin/stdout until stdin closes.
pub async fn serve_stdio(registry: Arc<ToolRegistry>, identity: ServerIdentity) -> ServeResult<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    serve(registry, identity, stdin, stdout).await
}

/// Serve over arbitrary transports; split out so tests can drive the loop
/// with in-memory pipes.
pub async fn serve<R, W>(
    registry: Arc<ToolRegistry>,
    identity: ServerIdentity,
    reader: R,
    mut writer: W,
) -> ServeResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(
        server = %identity.name,
        tools = registry.len(),
        "MCP server ready"
    );

    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "skipping malformed request line");
                continue;
            }
        };

        let Some(response) = handle_request(&registry, &identity, request).await else {
            continue;
        };

        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;
    }

    info!("stdin closed, MCP server shutting down");
    Ok(())
}

/// Dispatch one request. Notifications return no response.
pub async fn handle_request(
    registry: &ToolRegistry,
    identity: &ServerIdentity,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    debug!(method = %request.method, id = ?request.id, "handling MCP request");

    let Some(id) = request.id else {
        match request.method.as_str() {
            "notifications/initialized" => debug!("client finished initialization"),
            other => debug!(method = other, "ignoring notification"),
        }
        return None;
    };

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(identity, id, request.params),
        "ping" => JsonRpcResponse::success(id, Value::Object(serde_json::Map::new())),
        "tools/list" => handle_list_tools(registry, id),
        "tools/call" => handle_call_tool(registry, id, request.params).await,
        _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, "Method not found"),
    };

    Some(response)
}

fn handle_initialize(
    identity: &ServerIdentity,
    id: u64,
    params: Option<Value>,
) -> JsonRpcResponse {
    if let Some(params) = params {
        if let Ok(params) = serde_json::from_value::<InitializeParams>(params) {
            if let Some(client) = params.client_info {
                debug!(
                    client = %client.name,
                    version = client.version.as_deref().unwrap_or("unknown"),
                    "client connected"
                );
            }
        }
    }

    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
        },
        server_info: ServerInfo {
            name: identity.name.clone(),
            version: Some(identity.version.clone()),
        },
    };

    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(err) => JsonRpcResponse::error(id, INTERNAL_ERROR, err.to_string()),
    }
}

fn handle_list_tools(registry: &ToolRegistry, id: u64) -> JsonRpcResponse {
    let result = ListToolsResult {
        tools: registry.list(),
    };
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(err) => JsonRpcResponse::error(id, INTERNAL_ERROR, err.to_string()),
    }
}

async fn handle_call_tool(
    registry: &ToolRegistry,
    id: u64,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: CallToolParams = match params {
        Some(params) => match serde_json::from_value(params) {
            Ok(params) => params,
            Err(err) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {err}"))
            }
        },
        None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
    };

    let Some(tool) = registry.get(&params.name) else {
        return JsonRpcResponse::error(
            id,
            INVALID_PARAMS,
            format!("Unknown tool: {}", params.name),
        );
    };

    let args = params.arguments.unwrap_or(Value::Object(serde_json::Map::new()));

    let result = match tool.executor.execute(args).await {
        Ok(value) => ToolCallResult::text(value.to_string()),
        Err(message) => {
            warn!(tool = %params.name, error = %message, "tool execution failed");
            ToolCallResult::error(message)
        }
    };

    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(err) => JsonRpcResponse::error(id, INTERNAL_ERROR, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ToolBuilder, ToolExecutor};
    use serde_json::json;

    struct EchoExecutor;

    #[async_trait::async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(&self, args: Value) -> Result<Value, String> {
            Ok(json!({"echo": args}))
        }
    }

    struct FailingExecutor;

    #[async_trait::async_trait]
    impl ToolExecutor for FailingExecutor {
        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Err("backend unavailable".to_string())
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(ToolBuilder::new("echo").description("echo").build(EchoExecutor));
        registry.register(ToolBuilder::new("broken").build(FailingExecutor));
        registry
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let response = handle_request(
            &registry(),
            &ServerIdentity::default(),
            JsonRpcRequest::new(1, "initialize", Some(json!({}))),
        )
        .await
        .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "qolaba-mcp");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = handle_request(
            &registry(),
            &ServerIdentity::default(),
            JsonRpcRequest::new(2, "tools/list", None),
        )
        .await
        .unwrap();

        let tools = response.result.unwrap();
        assert_eq!(tools["tools"].as_array().unwrap().len(), 2);
        assert_eq!(tools["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn test_tool_call_success() {
        let response = handle_request(
            &registry(),
            &ServerIdentity::default(),
            JsonRpcRequest::new(
                3,
                "tools/call",
                Some(json!({"name": "echo", "arguments": {"x": 1}})),
            ),
        )
        .await
        .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"x\":1"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_tool_result_not_protocol_error() {
        let response = handle_request(
            &registry(),
            &ServerIdentity::default(),
            JsonRpcRequest::new(4, "tools/call", Some(json!({"name": "broken"}))),
        )
        .await
        .unwrap();

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "backend unavailable");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let response = handle_request(
            &registry(),
            &ServerIdentity::default(),
            JsonRpcRequest::new(5, "tools/call", Some(json!({"name": "nope"}))),
        )
        .await
        .unwrap();

        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = handle_request(
            &registry(),
            &ServerIdentity::default(),
            JsonRpcRequest::new(6, "resources/list", None),
        )
        .await
        .unwrap();

        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let request: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#)
                .unwrap();
        let response = handle_request(&registry(), &ServerIdentity::default(), request).await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_serve_loop_over_pipes() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let input = concat!(
            r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}"#,
            "\n",
            r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#,
            "\n",
            "not json\n",
            r#"{"jsonrpc": "2.0", "id": 2, "method": "tools/list"}"#,
            "\n",
        );

        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let serve_task = tokio::spawn(serve(
            Arc::new(registry()),
            ServerIdentity::default(),
            server_read,
            server_write,
        ));

        client.write_all(input.as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        serve_task.await.unwrap().unwrap();

        let lines: Vec<&str> = output.lines().collect();
        // Two responses: initialize and tools/list. The notification and the
        // malformed line produce nothing.
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], 1);
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["id"], 2);
    }
}
