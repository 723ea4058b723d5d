//! Orchestration layer for the Qolaba MCP bridge.
//!
//! Sequences validate → call → format for every exposed operation, shapes
//! API answers into MCP response envelopes, aggregates health checks, and
//! collects metrics. The HTTP client and the schema models are injected
//! collaborators; nothing in here talks to the network directly.

pub mod health;
pub mod metrics;
pub mod orchestrator;
pub mod responses;

pub use health::{
    ApiConnectivityCheck, ComponentHealth, ConfigurationCheck, HealthCheck, HealthService,
    HealthStatus, SystemHealth,
};
pub use metrics::MetricsCollector;
pub use orchestrator::{Operation, Orchestrator};
pub use responses::{shape_api_response, ErrorEnvelope, McpEnvelope, ResponseStatus};
