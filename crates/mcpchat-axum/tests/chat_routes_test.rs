//! Chat endpoint tests with a scripted model.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{StatusCode, header};
use mcpchat_core::{FunctionCallRequest, LlmPort, LlmResponse};
use mcpchat_mcp::InMemoryConfigRepository;
use serde_json::{Map, json};

use common::{EchoTools, FakeLlm, app_with, body_bytes, context_with, post_json, send, send_json};

fn content_type(response: &axum::http::Response<axum::body::Body>) -> String {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_chat_requires_messages() {
    let app = common::test_app();

    let (status, body) = send_json(&app, post_json("/api/chat", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Messages array is required");

    let (status, _) = send_json(&app, post_json("/api/chat", &json!({"messages": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_without_api_key_is_server_error() {
    let app = common::test_app();
    let request = json!({"messages": [{"role": "user", "content": "hi"}]});

    let (status, body) = send_json(&app, post_json("/api/chat", &request)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "GEMINI_API_KEY is not configured");
}

#[tokio::test]
async fn test_tools_disabled_streams_plain_text() {
    let llm: Arc<dyn LlmPort> = Arc::new(FakeLlm::streaming(&["Hello", ", ", "world"]));
    let app = app_with(context_with(
        Arc::new(InMemoryConfigRepository::new()),
        Some(llm),
    ));
    let request = json!({
        "messages": [{"role": "user", "content": "greet me"}],
        "useMCPTools": false
    });

    let response = send(&app, post_json("/api/chat", &request)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/plain"));
    assert_eq!(&body_bytes(response).await[..], b"Hello, world");
}

#[tokio::test]
async fn test_no_connected_tools_falls_back_to_plain_text() {
    let llm: Arc<dyn LlmPort> = Arc::new(FakeLlm::streaming(&["plain answer"]));
    let app = app_with(context_with(
        Arc::new(InMemoryConfigRepository::new()),
        Some(llm),
    ));
    let request = json!({"messages": [{"role": "user", "content": "hi"}]});

    let response = send(&app, post_json("/api/chat", &request)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/plain"));
    assert_eq!(&body_bytes(response).await[..], b"plain answer");
}

#[tokio::test]
async fn test_tool_chat_streams_agent_events() {
    let mut args = Map::new();
    args.insert("text".into(), json!("ping"));
    let llm: Arc<dyn LlmPort> = Arc::new(FakeLlm::replying(vec![
        LlmResponse::calls(vec![FunctionCallRequest {
            id: None,
            name: "echo".into(),
            args,
        }]),
        LlmResponse::text("The echo said ping."),
    ]));
    let ctx = context_with(Arc::new(InMemoryConfigRepository::new()), Some(llm))
        .with_tools(Arc::new(EchoTools));
    let app = app_with(ctx);
    let request = json!({
        "messages": [{"role": "user", "content": "echo ping"}],
        "useMCPTools": true
    });

    let response = send(&app, post_json("/api/chat", &request)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/event-stream"));

    let body = tokio::time::timeout(Duration::from_secs(5), body_bytes(response))
        .await
        .expect("agent stream should end");
    let text = String::from_utf8(body.to_vec()).unwrap();

    let order = [
        "event: tools_available",
        "event: tool_call",
        "event: tool_result",
        "event: text",
        "event: done",
    ];
    let mut cursor = 0;
    for marker in order {
        let found = text[cursor..]
            .find(marker)
            .unwrap_or_else(|| panic!("missing {marker} in {text}"));
        cursor += found + marker.len();
    }
    assert!(text.contains("The echo said ping."));
    assert!(text.contains(r#""reason":"completed""#));
}
