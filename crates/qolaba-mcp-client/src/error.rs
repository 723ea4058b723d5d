//! Client error types.

use crate::response::ApiResponse;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ApiClientError>;

/// Errors raised by the API client.
///
/// Every variant that terminates a call carries a message; HTTP-derived
/// variants also carry the status code and the last response envelope seen,
/// so callers can inspect the upstream body when translating failures.
#[derive(Debug, Error)]
pub enum ApiClientError {
    /// 401 that could not be resolved, or an OAuth token refresh failure.
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
        response: Option<Box<ApiResponse>>,
    },

    /// 429 that could not be resolved within the attempt budget.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        status: Option<u16>,
        response: Option<Box<ApiResponse>>,
    },

    /// Network or timeout failures that exhausted the attempt budget.
    #[error("Request timed out: {message}")]
    Timeout { message: String, attempts: u32 },

    /// Any other unresolved HTTP failure.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        response: Option<Box<ApiResponse>>,
    },

    /// Transport-level failure that is not retryable (e.g. a malformed
    /// request that never left the process). Propagated as-is.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The surrounding context was cancelled while the call was in flight.
    #[error("Operation cancelled")]
    Cancelled,

    /// The client was closed before the call started.
    #[error("Client is closed")]
    Closed,

    /// Internal invariant violation.
    #[error("Internal client error: {0}")]
    Internal(String),
}

impl ApiClientError {
    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            status: None,
            response: None,
        }
    }

    /// Create an authentication error carrying the upstream status.
    pub fn authentication_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Authentication {
            message: message.into(),
            status: Some(status),
            response: None,
        }
    }

    /// Create a rate limit error.
    pub fn rate_limit(message: impl Into<String>, response: Option<ApiResponse>) -> Self {
        Self::RateLimit {
            message: message.into(),
            status: Some(429),
            response: response.map(Box::new),
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>, attempts: u32) -> Self {
        Self::Timeout {
            message: message.into(),
            attempts,
        }
    }

    /// Create an HTTP error from a response envelope.
    ///
    /// The message is `"HTTP {status}"` extended with the body's `message`
    /// field when the body is a JSON object that has one.
    pub fn http(response: ApiResponse) -> Self {
        let status = response.status;
        let message = match response.body.error_message() {
            Some(detail) => format!("HTTP {status}: {detail}"),
            None => format!("HTTP {status}"),
        };
        Self::Http {
            status,
            message,
            response: Some(Box::new(response)),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// The HTTP status code associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::RateLimit { status, .. } => *status,
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The last response envelope seen before the error, if any.
    pub fn last_response(&self) -> Option<&ApiResponse> {
        match self {
            Self::Authentication { response, .. }
            | Self::RateLimit { response, .. }
            | Self::Http { response, .. } => response.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ParsedBody;
    use std::collections::HashMap;

    fn envelope(status: u16, body: ParsedBody) -> ApiResponse {
        ApiResponse {
            status,
            headers: HashMap::new(),
            body,
            request_id: None,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn test_http_error_message_with_body_detail() {
        let body = ParsedBody::Json(serde_json::json!({"message": "model not found"}));
        let err = ApiClientError::http(envelope(404, body));
        assert_eq!(err.to_string(), "HTTP 404: model not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_http_error_message_without_detail() {
        let err = ApiClientError::http(envelope(502, ParsedBody::Text("bad gateway".into())));
        assert_eq!(err.to_string(), "HTTP 502");
    }

    #[test]
    fn test_last_response_is_carried() {
        let err = ApiClientError::http(envelope(500, ParsedBody::Json(serde_json::json!({}))));
        assert_eq!(err.last_response().map(|r| r.status), Some(500));
    }

    #[test]
    fn test_timeout_has_no_status() {
        let err = ApiClientError::timeout("gave up", 4);
        assert_eq!(err.status(), None);
        assert!(err.last_response().is_none());
    }
}
