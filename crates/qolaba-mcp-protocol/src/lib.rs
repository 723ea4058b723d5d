//! MCP protocol support for the Qolaba bridge.
//!
//! JSON-RPC/MCP wire types, a tool registry, and a stdio serve loop that
//! exposes registered tools to an MCP client.

pub mod protocol;
pub mod registry;
pub mod serve;

pub use protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool, ServerCapabilities, ServerInfo,
    ToolCallResult, ToolContent, PROTOCOL_VERSION,
};
pub use registry::{RegisteredTool, ToolBuilder, ToolExecutor, ToolRegistry};
pub use serve::{serve, serve_stdio, ServeError, ServeResult, ServerIdentity};
