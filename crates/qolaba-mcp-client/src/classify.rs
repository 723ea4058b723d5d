//! Attempt outcome classification.
//!
//! The retry decision is a pure function over the outcome of one physical
//! attempt, so the executor's state machine can be tested without a
//! transport. 401 is deliberately not a generic retry class: the executor
//! owns the one-shot refresh-and-retry decision.

/// Transient failure class, used to pick the right terminal error when the
/// attempt budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Connect/timeout/other network failure (no HTTP status).
    Network,
    /// 5xx or 408.
    Server,
    /// 429.
    RateLimit,
}

/// What the executor should do with an attempt outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Status < 400: build the envelope and return.
    Success,
    /// Transient failure: retry if attempts remain, else fail with the
    /// class's terminal error.
    Retry(RetryClass),
    /// 401: the executor decides (one-shot OAuth refresh, or fail).
    Unauthorized,
    /// Non-retryable 4xx: fail immediately.
    FailPermanent,
    /// Transport error that is not a network condition (e.g. a request that
    /// could not be built). Propagated as-is, never retried.
    Propagate,
}

/// Classify a received HTTP status.
pub fn classify_status(status: u16) -> Action {
    match status {
        s if s < 400 => Action::Success,
        401 => Action::Unauthorized,
        429 => Action::Retry(RetryClass::RateLimit),
        408 => Action::Retry(RetryClass::Server),
        s if s >= 500 => Action::Retry(RetryClass::Server),
        _ => Action::FailPermanent,
    }
}

/// Classify a transport-level error (no response was received).
pub fn classify_transport(err: &reqwest::Error) -> Action {
    if err.is_builder() {
        Action::Propagate
    } else if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        Action::Retry(RetryClass::Network)
    } else {
        Action::Propagate
    }
}

/// Telemetry label for a status-code failure, mirroring the error classes
/// the monitoring side aggregates on.
pub fn status_error_type(status: u16) -> Option<&'static str> {
    match status {
        s if s < 400 => None,
        401 => Some("authentication"),
        403 => Some("authorization"),
        429 => Some("rate_limit"),
        s if s >= 500 => Some("server_error"),
        _ => Some("client_error"),
    }
}

/// Telemetry label for a transport-level error.
pub fn transport_error_type(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connection_error"
    } else {
        "network_error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses() {
        assert_eq!(classify_status(200), Action::Success);
        assert_eq!(classify_status(201), Action::Success);
        assert_eq!(classify_status(302), Action::Success);
    }

    #[test]
    fn test_retryable_statuses() {
        assert_eq!(classify_status(500), Action::Retry(RetryClass::Server));
        assert_eq!(classify_status(503), Action::Retry(RetryClass::Server));
        assert_eq!(classify_status(408), Action::Retry(RetryClass::Server));
        assert_eq!(classify_status(429), Action::Retry(RetryClass::RateLimit));
    }

    #[test]
    fn test_unauthorized_is_escalated_not_retried() {
        assert_eq!(classify_status(401), Action::Unauthorized);
    }

    #[test]
    fn test_permanent_client_errors() {
        assert_eq!(classify_status(400), Action::FailPermanent);
        assert_eq!(classify_status(403), Action::FailPermanent);
        assert_eq!(classify_status(404), Action::FailPermanent);
        assert_eq!(classify_status(422), Action::FailPermanent);
    }

    #[test]
    fn test_status_error_types() {
        assert_eq!(status_error_type(200), None);
        assert_eq!(status_error_type(401), Some("authentication"));
        assert_eq!(status_error_type(403), Some("authorization"));
        assert_eq!(status_error_type(429), Some("rate_limit"));
        assert_eq!(status_error_type(500), Some("server_error"));
        assert_eq!(status_error_type(404), Some("client_error"));
    }
}
