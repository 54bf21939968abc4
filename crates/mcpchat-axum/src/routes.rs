//! Route definitions and router construction.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// API routes without the `/api` prefix.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        // Live connections
        .route("/mcp/connect", post(handlers::mcp::connect))
        .route("/mcp/disconnect", post(handlers::mcp::disconnect))
        .route("/mcp/status", get(handlers::mcp::status))
        .route(
            "/mcp/tools",
            get(handlers::mcp::list_tools).post(handlers::mcp::call_tool),
        )
        .route(
            "/mcp/prompts",
            get(handlers::mcp::list_prompts).post(handlers::mcp::get_prompt),
        )
        .route(
            "/mcp/resources",
            get(handlers::mcp::list_resources).post(handlers::mcp::read_resource),
        )
        // Saved server configs
        .route(
            "/mcp/servers",
            get(handlers::servers::list).post(handlers::servers::save),
        )
        .route("/mcp/servers/export", get(handlers::servers::export))
        .route("/mcp/servers/import", post(handlers::servers::import))
        .route("/mcp/servers/{id}", delete(handlers::servers::remove))
        .route("/mcp/servers/{id}/connect", post(handlers::servers::connect))
        // Events (SSE)
        .route("/events", get(handlers::events::stream))
        // Chat
        .route("/chat", post(handlers::chat::chat))
}

/// Create the main router: `/health` plus everything under `/api`.
///
/// Axum 0.8 uses brace syntax for path parameters: `{id}`.
pub fn create_router(ctx: AxumContext, cors_config: &CorsConfig) -> Router {
    let state: AppState = Arc::new(ctx);
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes().with_state(state).layer(cors))
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
pub(crate) async fn health_check() -> &'static str {
    "OK"
}
