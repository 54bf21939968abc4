//! Shared fixtures for the route tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response, StatusCode, header};
use futures_util::stream;
use http_body_util::BodyExt;
use mcpchat_agent::AgentConfig;
use mcpchat_axum::{AxumContext, CorsConfig, create_router};
use mcpchat_core::{
    LlmError, LlmPort, LlmRequest, LlmResponse, McpConfigRepository, McpServiceError, McpTool,
    ServerTool, TextStream, ToolContent, ToolExecutor, ToolOutput, Turn,
};
use mcpchat_mcp::InMemoryConfigRepository;
use serde_json::{Map, Value};
use tower::ServiceExt;

/// Model that replays scripted replies and streams fixed chunks.
#[derive(Default)]
pub struct FakeLlm {
    replies: Mutex<VecDeque<LlmResponse>>,
    chunks: Vec<String>,
}

impl FakeLlm {
    pub fn replying(replies: Vec<LlmResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            chunks: Vec::new(),
        }
    }

    pub fn streaming(chunks: &[&str]) -> Self {
        Self {
            replies: Mutex::default(),
            chunks: chunks.iter().map(ToString::to_string).collect(),
        }
    }
}

#[async_trait]
impl LlmPort for FakeLlm {
    async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("no scripted reply".into()))
    }

    async fn stream_text(&self, _contents: Vec<Turn>) -> Result<TextStream, LlmError> {
        let chunks: Vec<Result<String, LlmError>> = self.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// One fixed tool that echoes its arguments.
pub struct EchoTools;

#[async_trait]
impl ToolExecutor for EchoTools {
    async fn available_tools(&self) -> Vec<ServerTool> {
        vec![ServerTool {
            server_id: "mcp-echo".into(),
            server_name: "Echo".into(),
            tool: McpTool::new("echo").with_description("Echo the arguments back"),
        }]
    }

    async fn execute_tool(
        &self,
        _server_id: &str,
        _tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, McpServiceError> {
        Ok(ToolOutput {
            content: vec![ToolContent::text(Value::Object(arguments).to_string())],
            is_error: false,
        })
    }
}

pub fn context_with(
    repository: Arc<dyn McpConfigRepository>,
    llm: Option<Arc<dyn LlmPort>>,
) -> AxumContext {
    AxumContext::new(repository, llm, AgentConfig::default())
}

/// Router over an empty in-memory store and no language model.
pub fn test_app() -> Router {
    app_with(context_with(Arc::new(InMemoryConfigRepository::new()), None))
}

pub fn app_with(ctx: AxumContext) -> Router {
    create_router(ctx, &CorsConfig::AllowAll)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Status and parsed JSON body.
pub async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = send(app, request).await;
    let status = response.status();
    let body = body_bytes(response).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}
