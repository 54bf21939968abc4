//! Axum-specific error types and mappings.
//!
//! Maps `McpServiceError` and `ConfigError` to HTTP status codes and a
//! `{error, status}` JSON body.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mcpchat_core::{ConfigError, McpRepositoryError, McpServiceError};
use serde::Serialize;
use thiserror::Error;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The server exists but has no live session.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl HttpError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::Internal(msg) => msg,
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        }

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<McpServiceError> for HttpError {
    fn from(err: McpServiceError) -> Self {
        match err {
            McpServiceError::InvalidConfig(e) => e.into(),
            McpServiceError::NotConnected(_) => Self::Conflict(err.to_string()),
            McpServiceError::NotFound(_) | McpServiceError::Repository(McpRepositoryError::NotFound(_)) => {
                Self::NotFound(err.to_string())
            }
            McpServiceError::Connection(msg) => Self::Internal(msg),
            McpServiceError::Protocol(_)
            | McpServiceError::ToolError(_)
            | McpServiceError::Repository(_)
            | McpServiceError::Internal(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ConfigError> for HttpError {
    fn from(err: ConfigError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
