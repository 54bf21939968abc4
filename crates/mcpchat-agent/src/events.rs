//! Events streamed to the caller while the loop runs.

use mcpchat_core::{ServerTool, ToolCall, ToolCallResult};
use serde::Serialize;

/// A tool offered to the model in this run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub server_id: String,
    pub server_name: String,
}

impl From<&ServerTool> for AvailableTool {
    fn from(tool: &ServerTool) -> Self {
        Self {
            name: tool.tool.name.clone(),
            description: tool.tool.description.clone(),
            server_id: tool.server_id.clone(),
            server_name: tool.server_name.clone(),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    /// The model produced a final answer.
    Completed,
    /// The round budget ran out before a final answer.
    IterationLimit,
}

/// One step of a loop run.
///
/// Serializes to the event payload only; the event name comes from
/// [`AgentEvent::event_name`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AgentEvent {
    ToolsAvailable { tools: Vec<AvailableTool> },
    ToolCall(ToolCall),
    ToolResult(ToolCallResult),
    Text { content: String },
    Error { message: String },
    Done { reason: DoneReason },
}

impl AgentEvent {
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ToolsAvailable { .. } => "tools_available",
            Self::ToolCall(_) => "tool_call",
            Self::ToolResult(_) => "tool_result",
            Self::Text { .. } => "text",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn test_payload_shapes() {
        let call = AgentEvent::ToolCall(ToolCall {
            id: "call-0-0".into(),
            name: "search".into(),
            args: Map::new(),
            server_id: Some("mcp-1".into()),
            server_name: Some("Search".into()),
        });
        assert_eq!(call.event_name(), "tool_call");
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({"id": "call-0-0", "name": "search", "args": {}, "serverId": "mcp-1", "serverName": "Search"})
        );

        let done = AgentEvent::Done {
            reason: DoneReason::IterationLimit,
        };
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            json!({"reason": "iteration_limit"})
        );
        assert!(done.is_terminal());

        let text = AgentEvent::Text {
            content: "hi".into(),
        };
        assert_eq!(serde_json::to_value(&text).unwrap(), json!({"content": "hi"}));
    }
}
