//! Language-model port.
//!
//! The agent loop drives the model through this trait; vendor adapters
//! translate [`LlmRequest`] into their own wire format.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{ToolInputSchema, Turn};

/// A callable function offered to the model.
///
/// `parameters` stays `None` for tools that declare no input schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ToolInputSchema>,
}

/// One non-streaming model call.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub contents: Vec<Turn>,
    pub functions: Vec<FunctionDeclaration>,
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallRequest {
    /// Provider-assigned id, when the provider issues one.
    pub id: Option<String>,
    pub name: String,
    pub args: Map<String, Value>,
}

/// Model reply: final text, function calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    pub text: Option<String>,
    pub function_calls: Vec<FunctionCallRequest>,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_calls: Vec::new(),
        }
    }

    pub fn calls(function_calls: Vec<FunctionCallRequest>) -> Self {
        Self {
            text: None,
            function_calls,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Language model request failed: {0}")]
    Http(String),

    #[error("Language model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected language model response: {0}")]
    InvalidResponse(String),
}

/// Streamed text chunks for the plain completion path.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Single completion; may return function calls when `functions` is non-empty.
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Plain completion streamed as text chunks.
    async fn stream_text(&self, contents: Vec<Turn>) -> Result<TextStream, LlmError>;
}
