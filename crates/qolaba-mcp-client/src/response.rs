//! Response envelope building.
//!
//! Converts a raw transport response into a structured [`ApiResponse`].
//! Building never fails: a body that doesn't parse as its advertised
//! content type degrades to the next representation down. Deciding whether
//! the response is an error is the executor's job, not the builder's.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Parsed response body, decided once from the content type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedBody {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl ParsedBody {
    /// The body as JSON, if it parsed as such.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ParsedBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The `message` field of a JSON object body, used for error messages.
    pub fn error_message(&self) -> Option<&str> {
        self.as_json()?.get("message")?.as_str()
    }

    /// Size of the body in bytes, as received.
    pub fn size(&self) -> usize {
        match self {
            ParsedBody::Json(value) => value.to_string().len(),
            ParsedBody::Text(text) => text.len(),
            ParsedBody::Binary(bytes) => bytes.len(),
        }
    }
}

/// Structured result of one successful logical call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, keys lowercased.
    pub headers: HashMap<String, String>,
    /// Parsed body.
    pub body: ParsedBody,
    /// Upstream request id (`x-request-id` response header).
    pub request_id: Option<String>,
    /// Wall-clock time of the attempt that produced this response.
    pub elapsed_ms: u64,
}

impl ApiResponse {
    /// Look up a header by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The `Retry-After` header as whole seconds, if present and numeric.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.header("retry-after")?.trim().parse().ok()
    }
}

/// Build an [`ApiResponse`] from the pieces of a fully read transport
/// response. Deterministic; never fails.
pub fn build_response(
    status: u16,
    headers: HashMap<String, String>,
    bytes: &[u8],
    elapsed_ms: u64,
) -> ApiResponse {
    let content_type = headers
        .get("content-type")
        .map(|v| v.to_ascii_lowercase())
        .unwrap_or_default();

    let body = if content_type.contains("application/json") {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => ParsedBody::Json(value),
            Err(err) => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                let preview: String = text.chars().take(200).collect();
                warn!(
                    error = %err,
                    preview = %preview,
                    "failed to parse JSON response body, treating as text"
                );
                ParsedBody::Text(text)
            }
        }
    } else if content_type.starts_with("text/") {
        ParsedBody::Text(String::from_utf8_lossy(bytes).into_owned())
    } else {
        ParsedBody::Binary(bytes.to_vec())
    };

    let request_id = headers.get("x-request-id").cloned();

    ApiResponse {
        status,
        headers,
        body,
        request_id,
        elapsed_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_json_body() {
        let response = build_response(
            200,
            headers(&[("content-type", "application/json")]),
            br#"{"task_id":"t1"}"#,
            12,
        );
        assert_eq!(
            response.body,
            ParsedBody::Json(serde_json::json!({"task_id": "t1"}))
        );
        assert_eq!(response.elapsed_ms, 12);
    }

    #[test]
    fn test_invalid_json_degrades_to_text() {
        let response = build_response(
            200,
            headers(&[("content-type", "application/json")]),
            b"not json at all",
            0,
        );
        assert_eq!(response.body, ParsedBody::Text("not json at all".into()));
    }

    #[test]
    fn test_text_body() {
        let response = build_response(
            200,
            headers(&[("content-type", "text/plain; charset=utf-8")]),
            b"hello",
            0,
        );
        assert_eq!(response.body, ParsedBody::Text("hello".into()));
    }

    #[test]
    fn test_binary_body() {
        let response = build_response(
            200,
            headers(&[("content-type", "audio/mpeg")]),
            &[0xffu8, 0xfb, 0x90],
            0,
        );
        assert_eq!(response.body, ParsedBody::Binary(vec![0xff, 0xfb, 0x90]));
        assert_eq!(response.body.size(), 3);
    }

    #[test]
    fn test_missing_content_type_is_binary() {
        let response = build_response(200, HashMap::new(), b"raw", 0);
        assert!(matches!(response.body, ParsedBody::Binary(_)));
    }

    #[test]
    fn test_request_id_extraction() {
        let response = build_response(200, headers(&[("x-request-id", "req-9")]), b"", 0);
        assert_eq!(response.request_id.as_deref(), Some("req-9"));
    }

    #[test]
    fn test_retry_after_parsing() {
        let response = build_response(429, headers(&[("retry-after", "2")]), b"", 0);
        assert_eq!(response.retry_after_secs(), Some(2));

        let response = build_response(429, headers(&[("retry-after", "later")]), b"", 0);
        assert_eq!(response.retry_after_secs(), None);
    }

    #[test]
    fn test_error_message_from_json_object() {
        let body = ParsedBody::Json(serde_json::json!({"message": "boom"}));
        assert_eq!(body.error_message(), Some("boom"));

        let body = ParsedBody::Json(serde_json::json!(["no", "object"]));
        assert_eq!(body.error_message(), None);

        let body = ParsedBody::Text("boom".into());
        assert_eq!(body.error_message(), None);
    }
}
