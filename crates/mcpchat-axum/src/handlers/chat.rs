//! Chat handler.
//!
//! With tools enabled and at least one connected tool, the response is an
//! SSE stream of agent loop events. Otherwise the model's answer is streamed
//! back as plain text.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use mcpchat_agent::AgentLoop;
use mcpchat_core::{ChatMessage, Conversation, LlmPort};
use tracing::{debug, info, warn};

use crate::dto::ChatRequest;
use crate::error::HttpError;
use crate::sse;
use crate::state::AppState;

pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(request) = body?;
    let use_tools = request.use_mcp_tools;
    let messages = request.into_messages()?;

    let llm = state
        .llm
        .clone()
        .ok_or_else(|| HttpError::Internal("GEMINI_API_KEY is not configured".to_string()))?;

    if use_tools {
        let tool_count = state.tools.available_tools().await.len();
        if tool_count > 0 {
            info!(messages = messages.len(), tools = tool_count, "Starting tool-augmented chat");
            let agent = AgentLoop::new(llm, Arc::clone(&state.tools), state.agent.clone());
            let events = agent
                .run(messages)
                .map(|event| Ok::<_, Infallible>(sse::agent_event(&event)));
            return Ok(Sse::new(events)
                .keep_alive(KeepAlive::default())
                .into_response());
        }
        debug!("No connected MCP tools, falling back to plain chat");
    }

    plain_completion(llm, &messages).await
}

async fn plain_completion(
    llm: Arc<dyn LlmPort>,
    messages: &[ChatMessage],
) -> Result<Response, HttpError> {
    let contents = Conversation::from_messages(messages).into_turns();
    let chunks = llm
        .stream_text(contents)
        .await
        .map_err(|e| HttpError::Internal(e.to_string()))?;

    let body = Body::from_stream(chunks.map(|chunk| {
        chunk.map_err(|e| {
            warn!(error = %e, "Chat stream failed mid-response");
            std::io::Error::other(e)
        })
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| HttpError::Internal(e.to_string()))
}
