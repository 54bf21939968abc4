//! Tool dispatch bridge between the model and connected MCP servers.
//!
//! A [`ToolBridge`] is built once per loop run from the tools that are
//! connected at that moment. It maps tool names back to their owning server
//! and turns every execution outcome, including failures, into a
//! [`ToolCallResult`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mcpchat_core::{
    FunctionDeclaration, McpTool, ServerTool, ToolCall, ToolCallResult, ToolContent,
    ToolExecutor, ToolOutput,
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("No connected MCP server provides tool '{0}'")]
    UnknownTool(String),
}

/// Map MCP tools to model function declarations.
///
/// Tools without an input schema get no `parameters` at all.
pub fn to_function_declarations(tools: &[McpTool]) -> Vec<FunctionDeclaration> {
    tools
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        })
        .collect()
}

/// Model-facing text for a tool result. Binary payloads never reach the model.
pub fn flatten_contents(contents: &[ToolContent]) -> String {
    contents
        .iter()
        .map(|item| match item {
            ToolContent::Text { text } => text.clone(),
            ToolContent::Image { mime_type, .. } => format!("[Image generated: {mime_type}]"),
            ToolContent::Audio { mime_type, .. } => format!("[Audio generated: {mime_type}]"),
            ToolContent::Resource { uri, .. } => format!("[Resource: {uri}]"),
            ToolContent::Unknown { raw, .. } => raw.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Owner of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub server_id: String,
    pub server_name: String,
}

/// Name to server lookup for one loop run.
///
/// When two servers expose the same tool name the first one wins.
#[derive(Debug, Clone, Default)]
pub struct ToolRouter {
    tools: Vec<ServerTool>,
    routes: HashMap<String, Route>,
}

impl ToolRouter {
    pub fn new(tools: Vec<ServerTool>) -> Self {
        let mut routes: HashMap<String, Route> = HashMap::with_capacity(tools.len());
        let mut unique = Vec::with_capacity(tools.len());
        for tool in tools {
            if let Some(existing) = routes.get(&tool.tool.name) {
                warn!(
                    tool = %tool.tool.name,
                    kept = %existing.server_id,
                    ignored = %tool.server_id,
                    "Duplicate tool name across MCP servers"
                );
                continue;
            }
            routes.insert(
                tool.tool.name.clone(),
                Route {
                    server_id: tool.server_id.clone(),
                    server_name: tool.server_name.clone(),
                },
            );
            unique.push(tool);
        }
        Self {
            tools: unique,
            routes,
        }
    }

    pub fn resolve(&self, tool_name: &str) -> Result<&Route, DispatchError> {
        self.routes
            .get(tool_name)
            .ok_or_else(|| DispatchError::UnknownTool(tool_name.to_string()))
    }

    pub fn tools(&self) -> &[ServerTool] {
        &self.tools
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        let tools: Vec<McpTool> = self.tools.iter().map(|t| t.tool.clone()).collect();
        to_function_declarations(&tools)
    }
}

/// Executes model-issued calls through a [`ToolExecutor`].
pub struct ToolBridge {
    executor: Arc<dyn ToolExecutor>,
    router: ToolRouter,
    timeout: Option<Duration>,
}

impl ToolBridge {
    /// Snapshot the executor's current tools.
    pub async fn connect(executor: Arc<dyn ToolExecutor>, timeout: Option<Duration>) -> Self {
        let router = ToolRouter::new(executor.available_tools().await);
        Self {
            executor,
            router,
            timeout,
        }
    }

    pub const fn router(&self) -> &ToolRouter {
        &self.router
    }

    /// Build the call record for a model request, resolving its server.
    pub fn prepare(
        &self,
        id: String,
        name: String,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> ToolCall {
        let route = self.router.resolve(&name).ok();
        ToolCall {
            id,
            server_id: route.map(|r| r.server_id.clone()),
            server_name: route.map(|r| r.server_name.clone()),
            name,
            args,
        }
    }

    /// Run one call. Never fails: errors become `is_error` results.
    pub async fn execute(&self, call: &ToolCall) -> ToolCallResult {
        let Some(server_id) = call.server_id.as_deref() else {
            let error = DispatchError::UnknownTool(call.name.clone());
            return failure(call, &error.to_string());
        };

        debug!(server_id = %server_id, tool = %call.name, call_id = %call.id, "Executing tool");
        let execution = self
            .executor
            .execute_tool(server_id, &call.name, call.args.clone());

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(server_id = %server_id, tool = %call.name, "Tool call timed out");
                    return failure(
                        call,
                        &format!("Tool '{}' timed out after {}s", call.name, limit.as_secs_f64()),
                    );
                }
            },
            None => execution.await,
        };

        match outcome {
            Ok(output) => success(call, output),
            Err(e) => {
                warn!(server_id = %server_id, tool = %call.name, error = %e, "Tool call failed");
                failure(call, &format!("Error executing tool '{}': {e}", call.name))
            }
        }
    }
}

fn success(call: &ToolCall, output: ToolOutput) -> ToolCallResult {
    ToolCallResult {
        tool_call_id: call.id.clone(),
        name: call.name.clone(),
        result: flatten_contents(&output.content),
        contents: output.content,
        is_error: output.is_error,
    }
}

fn failure(call: &ToolCall, message: &str) -> ToolCallResult {
    let output = ToolOutput::error(message);
    ToolCallResult {
        tool_call_id: call.id.clone(),
        name: call.name.clone(),
        result: message.to_string(),
        contents: output.content,
        is_error: true,
    }
}
