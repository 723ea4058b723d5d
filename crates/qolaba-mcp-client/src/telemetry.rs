//! Per-attempt telemetry.
//!
//! The executor reports every physical attempt to an injected sink. Sinks
//! are observers only: recording must be cheap, non-blocking, and must never
//! fail the call.

use std::sync::Arc;

/// One physical attempt as seen by the executor.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// Endpoint path as passed by the caller (not the resolved URL).
    pub endpoint: String,
    /// HTTP method.
    pub method: String,
    /// Response status, or 0 when no response was received.
    pub status_code: u16,
    /// Attempt duration.
    pub duration_ms: u64,
    /// Request body size in bytes.
    pub request_size: usize,
    /// Response body size in bytes (0 when no response).
    pub response_size: usize,
    /// Error class label, when the attempt failed.
    pub error_type: Option<String>,
}

/// Sink for attempt records.
pub trait TelemetrySink: Send + Sync {
    /// Record one attempt. Must not block or panic; the executor ignores
    /// whatever happens in here.
    fn record_attempt(&self, record: AttemptRecord);
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record_attempt(&self, _record: AttemptRecord) {}
}

/// Shared sink handle used by the client.
pub type SharedSink = Arc<dyn TelemetrySink>;
