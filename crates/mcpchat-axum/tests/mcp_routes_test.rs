//! Contract tests for the MCP endpoints.
//!
//! These verify status codes and the JSON shapes the web client reads.

mod common;

use std::sync::Arc;

use axum::http::{StatusCode, header};
use serde_json::json;

use common::{body_bytes, context_with, delete, get, post_json, send, send_json, test_app};
use mcpchat_mcp::JsonFileConfigRepository;

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = test_app();
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"OK");
}

#[tokio::test]
async fn test_connect_rejects_missing_fields() {
    let app = test_app();
    let (status, body) =
        send_json(&app, post_json("/api/mcp/connect", &json!({"name": "Files"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: id, transport");
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_connect_rejects_missing_transport_fields() {
    let app = test_app();
    let (status, body) = send_json(
        &app,
        post_json(
            "/api/mcp/connect",
            &json!({"id": "mcp-1", "name": "Remote", "transport": "streamable-http"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("requires a URL"));
}

#[tokio::test]
async fn test_connect_rejects_non_json_body() {
    let app = test_app();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/mcp/connect")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("not json"))
        .unwrap();

    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_connect_returns_error_state() {
    let app = test_app();
    let config = json!({"id": "mcp-false", "name": "Broken", "transport": "stdio", "command": "false"});

    let (status, body) = tokio::time::timeout(
        std::time::Duration::from_secs(20),
        send_json(&app, post_json("/api/mcp/connect", &config)),
    )
    .await
    .expect("connect should finish");

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["serverId"], "mcp-false");
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert_eq!(body["tools"], json!([]));

    let (status, body) = send_json(&app, get("/api/mcp/status?serverId=mcp-false")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_disconnect_contract() {
    let app = test_app();

    let (status, body) = send_json(&app, post_json("/api/mcp/disconnect", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field: serverId");

    let (status, body) =
        send_json(&app, post_json("/api/mcp/disconnect", &json!({"serverId": "mcp-9"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "serverId": "mcp-9"}));

    let (_, body) = send_json(&app, get("/api/mcp/status?serverId=mcp-9")).await;
    assert_eq!(body["status"], "disconnected");
}

#[tokio::test]
async fn test_status_shapes() {
    let app = test_app();

    let (status, body) = send_json(&app, get("/api/mcp/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"states": [], "tools": []}));

    let (status, body) = send_json(&app, get("/api/mcp/status?serverId=unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Server not found");
}

#[tokio::test]
async fn test_capability_lists_require_server_id() {
    let app = test_app();
    for uri in ["/api/mcp/tools", "/api/mcp/prompts", "/api/mcp/resources"] {
        let (status, body) = send_json(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "Missing required query param: serverId");
    }
}

#[tokio::test]
async fn test_calls_against_unconnected_server_conflict() {
    let app = test_app();

    let (status, body) = send_json(&app, get("/api/mcp/tools?serverId=mcp-1")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("mcp-1"));

    let (status, _) = send_json(
        &app,
        post_json(
            "/api/mcp/tools",
            &json!({"serverId": "mcp-1", "toolName": "echo", "arguments": {"x": 1}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send_json(
        &app,
        post_json("/api/mcp/resources", &json!({"serverId": "mcp-1", "uri": "file:///a"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_execute_requires_fields() {
    let app = test_app();

    let (status, body) =
        send_json(&app, post_json("/api/mcp/tools", &json!({"serverId": "mcp-1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: serverId, toolName");

    let (status, body) =
        send_json(&app, post_json("/api/mcp/prompts", &json!({"promptName": "greet"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: serverId, promptName");

    let (status, body) =
        send_json(&app, post_json("/api/mcp/resources", &json!({"serverId": "mcp-1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: serverId, uri");
}

#[tokio::test]
async fn test_saved_server_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("servers.json");
    let app = common::app_with(context_with(
        Arc::new(JsonFileConfigRepository::new(&path)),
        None,
    ));

    let (status, saved) = send_json(
        &app,
        post_json(
            "/api/mcp/servers",
            &json!({"id": "", "name": "Files", "transport": "stdio", "command": "mcp-files"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = saved["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("mcp-"));
    assert!(path.exists());

    let (status, listed) = send_json(&app, get("/api/mcp/servers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["server"]["name"], "Files");
    assert_eq!(listed[0]["state"]["status"], "disconnected");

    let response = send(&app, get("/api/mcp/servers/export")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let exported: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(exported[0]["id"], id.as_str());

    let response = send(&app, delete(&format!("/api/mcp/servers/{id}"))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, delete(&format!("/api/mcp/servers/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, post_json(&format!("/api/mcp/servers/{id}/connect"), &json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_save_rejects_invalid_config() {
    let app = test_app();
    let (status, body) = send_json(
        &app,
        post_json("/api/mcp/servers", &json!({"id": "a", "name": "A", "transport": "sse"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("sse transport requires a URL"));
}

#[tokio::test]
async fn test_import_replaces_configs_and_rejects_bad_documents() {
    let app = test_app();

    let document = json!([
        {"id": "mcp-a", "name": "A", "transport": "stdio", "command": "a"},
        {"id": "mcp-b", "name": "B", "transport": "sse", "url": "http://localhost:9000/sse"}
    ]);
    let (status, imported) =
        send_json(&app, post_json("/api/mcp/servers/import", &document)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(imported.as_array().map(Vec::len), Some(2));

    let (status, body) = send_json(
        &app,
        post_json("/api/mcp/servers/import", &json!([{"name": "no id"}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid config format"));

    let (_, listed) = send_json(&app, get("/api/mcp/servers")).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_events_endpoint_returns_sse_stream() {
    let app = test_app();
    let response = send(&app, get("/api/events")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/event-stream"));
}
