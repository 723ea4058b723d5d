//! Health checks.
//!
//! Independent component checks run concurrently with a per-check timeout
//! and aggregate worst-of into a system verdict. Built-ins cover
//! configuration completeness and API connectivity; deployments can
//! register additional checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use qolaba_mcp_client::{ApiClient, ApiClientError, AuthMode, ClientConfig};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Per-check timeout; a check that overruns is reported as degraded.
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Component or system verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    /// The worse of two verdicts.
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        use HealthStatus::*;
        match (self, other) {
            (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
            (Degraded, _) | (_, Degraded) => Degraded,
            _ => Healthy,
        }
    }
}

/// Result of one component check.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
            response_time_ms: None,
            details: None,
        }
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            response_time_ms: None,
            details: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            response_time_ms: None,
            details: None,
        }
    }

    pub fn with_response_time(mut self, elapsed: Duration) -> Self {
        self.response_time_ms = Some(elapsed.as_millis() as u64);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Aggregated system health.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub version: String,
    pub uptime_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

impl SystemHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    pub fn unhealthy_components(&self) -> Vec<&ComponentHealth> {
        self.components
            .iter()
            .filter(|c| c.status == HealthStatus::Unhealthy)
            .collect()
    }
}

/// One registered health check.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Component name used in reports.
    fn name(&self) -> &str;

    /// Run the check.
    async fn check(&self) -> ComponentHealth;
}

/// Runs registered checks and aggregates their verdicts.
pub struct HealthService {
    checks: Vec<Arc<dyn HealthCheck>>,
    started_at: Instant,
    version: String,
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            started_at: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Register an additional check.
    pub fn register(&mut self, check: Arc<dyn HealthCheck>) {
        self.checks.push(check);
    }

    /// Run all checks concurrently and aggregate.
    pub async fn status(&self) -> SystemHealth {
        let runs = self.checks.iter().map(|check| {
            let check = Arc::clone(check);
            async move {
                let name = check.name().to_string();
                let started = Instant::now();
                match tokio::time::timeout(CHECK_TIMEOUT, check.check()).await {
                    Ok(result) => result.with_response_time(started.elapsed()),
                    Err(_) => {
                        warn!(component = %name, "health check timed out");
                        ComponentHealth::degraded(name, "check timed out")
                            .with_response_time(started.elapsed())
                    }
                }
            }
        });

        let components = join_all(runs).await;
        let status = components
            .iter()
            .fold(HealthStatus::Healthy, |acc, c| acc.worst(c.status));

        SystemHealth {
            status,
            components,
            version: self.version.clone(),
            uptime_seconds: self.started_at.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}

/// Verifies the client configuration is complete enough to reach the API.
pub struct ConfigurationCheck {
    config: ClientConfig,
}

impl ConfigurationCheck {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl HealthCheck for ConfigurationCheck {
    fn name(&self) -> &str {
        "configuration"
    }

    async fn check(&self) -> ComponentHealth {
        if let Err(err) = self.config.validate() {
            return ComponentHealth::unhealthy(self.name(), err.to_string());
        }
        if self.config.base_url.is_none() {
            return ComponentHealth::unhealthy(self.name(), "no API base URL configured");
        }
        match self.config.auth_mode() {
            AuthMode::None => {
                ComponentHealth::degraded(self.name(), "no authentication configured")
            }
            mode => ComponentHealth::healthy(self.name())
                .with_details(json!({"auth_mode": format!("{mode:?}").to_lowercase()})),
        }
    }
}

/// Probes the remote API's health endpoint through the shared client.
pub struct ApiConnectivityCheck {
    client: Arc<ApiClient>,
}

impl ApiConnectivityCheck {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthCheck for ApiConnectivityCheck {
    fn name(&self) -> &str {
        "api_connectivity"
    }

    async fn check(&self) -> ComponentHealth {
        match self.client.get("health").await {
            Ok(response) => ComponentHealth::healthy(self.name())
                .with_details(json!({"status_code": response.status})),
            Err(err @ ApiClientError::Http { status, .. }) if status < 500 => {
                // The API answered; an unexpected 4xx means reachable but
                // misconfigured on our side.
                ComponentHealth::degraded(self.name(), err.to_string())
                    .with_details(json!({"status_code": status}))
            }
            Err(err) => ComponentHealth::unhealthy(self.name(), err.to_string()),
        }
    }
}
