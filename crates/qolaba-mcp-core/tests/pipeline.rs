//! End-to-end pipeline tests: validate → call → shape.

use qolaba_mcp_client::{ApiClient, ClientConfig};
use qolaba_mcp_core::{MetricsCollector, Operation, Orchestrator};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn orchestrator(server: &MockServer) -> (Orchestrator, Arc<MetricsCollector>) {
    let metrics = Arc::new(MetricsCollector::new());
    let config = ClientConfig {
        base_url: Some(server.uri()),
        api_key: Some("test-key".into()),
        ..Default::default()
    };
    let client = Arc::new(ApiClient::with_telemetry(config, metrics.clone()).unwrap());
    (Orchestrator::new(client, metrics.clone()), metrics)
}

#[tokio::test]
async fn text_to_image_returns_task_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/text-to-image"))
        .and(body_partial_json(json!({"prompt": "a cat", "model": "flux"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"task_id": "t1", "status": "pending"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (orchestrator, _) = orchestrator(&server);
    let envelope = orchestrator
        .execute(Operation::TextToImage, json!({"prompt": "a cat"}), None)
        .await;

    assert!(envelope.is_success());
    let value = envelope.into_value();
    assert_eq!(value["response_type"], "task_created");
    assert_eq!(value["task_id"], "t1");
}

#[tokio::test]
async fn invalid_payload_short_circuits_without_http_call() {
    let server = MockServer::start().await;
    // No mocks mounted: any HTTP call would 404 and the envelope would be an
    // api_client_error instead of a validation_error.

    let (orchestrator, _) = orchestrator(&server);
    let envelope = orchestrator
        .execute(
            Operation::TextToImage,
            json!({"prompt": "x", "width": 4096}),
            None,
        )
        .await;

    assert!(!envelope.is_success());
    let value = envelope.into_value();
    assert_eq!(value["error_code"], "validation_error");
    assert_eq!(value["error_details"]["violations"][0]["field"], "width");
}

#[tokio::test]
async fn chat_content_is_shaped_with_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
            "model": "gpt-4"
        })))
        .mount(&server)
        .await;

    let (orchestrator, _) = orchestrator(&server);
    let envelope = orchestrator
        .execute(
            Operation::Chat,
            json!({"messages": [{"role": "user", "content": "hello"}]}),
            Some("rid-7".into()),
        )
        .await;

    let value = envelope.into_value();
    assert_eq!(value["response_type"], "content");
    assert_eq!(value["content_type"], "json");
    assert_eq!(value["metadata"]["model"], "gpt-4");
    assert_eq!(value["request_id"], "rid-7");
}

#[tokio::test]
async fn api_failure_becomes_error_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "unknown model"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (orchestrator, metrics) = orchestrator(&server);
    let envelope = orchestrator
        .execute(
            Operation::Chat,
            json!({"messages": [{"role": "user", "content": "hello"}]}),
            None,
        )
        .await;

    assert!(!envelope.is_success());
    let value = envelope.into_value();
    assert_eq!(value["error_code"], "api_client_error");
    assert_eq!(value["error_details"]["status_code"], 400);
    assert!(value["error_message"]
        .as_str()
        .unwrap()
        .contains("HTTP 400"));

    // The failed operation and the underlying attempt both reach metrics.
    let rendered = metrics.export_prometheus();
    assert!(rendered
        .contains("qolaba_mcp_operations_total{operation=\"chat\",outcome=\"error\"} 1"));
    assert!(rendered
        .contains("qolaba_api_requests_total{endpoint=\"chat\",method=\"POST\",status=\"400\"} 1"));
}

#[tokio::test]
async fn task_status_is_fetched_and_shaped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/task-status/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_id": "t1",
            "status": "running",
            "progress": 55.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (orchestrator, _) = orchestrator(&server);
    let envelope = orchestrator.task_status("t1", None).await;

    assert!(envelope.is_success());
    let value = envelope.into_value();
    assert_eq!(value["response_type"], "task_status");
    assert_eq!(value["status"], "in_progress");
    assert_eq!(value["progress"], 55.0);
}

#[tokio::test]
async fn non_json_body_reports_unexpected_format() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/task-status/t2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("plain text")
                .insert_header("Content-Type", "text/plain"),
        )
        .mount(&server)
        .await;

    let (orchestrator, _) = orchestrator(&server);
    let envelope = orchestrator.task_status("t2", None).await;

    let value = envelope.into_value();
    assert_eq!(value["error_code"], "unexpected_response_format");
}
