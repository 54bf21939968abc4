//! JSON-RPC 2.0 framing and MCP wire payloads.
//!
//! Reference: <https://modelcontextprotocol.io/specification>

use mcpchat_core::{McpPrompt, McpResource, McpTool, ResourceContent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC "method not found"; servers answer unsupported list calls with it.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Request correlation id. mcpchat always sends numbers, servers may use strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Number(id),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// `None` only for errors about unparseable requests.
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Split into the result payload or the server's error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match (self.error, self.result) {
            (Some(error), _) => Err(error),
            (None, result) => Ok(result.unwrap_or(Value::Null)),
        }
    }
}

/// Any message that travels over a transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// Classify by shape: `method` + `id` is a request, `method` alone a
    /// notification, anything else a response.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let has_method = value.get("method").is_some();
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        match (has_method, has_id) {
            (true, true) => serde_json::from_value(value).map(Self::Request),
            (true, false) => serde_json::from_value(value).map(Self::Notification),
            (false, _) => serde_json::from_value(value).map(Self::Response),
        }
    }

    /// Parse one frame, which may be a single message or a batch.
    pub fn parse_frame(text: &str) -> Result<Vec<Self>, serde_json::Error> {
        match serde_json::from_str::<Value>(text)? {
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            single => Self::from_value(single).map(|m| vec![m]),
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Server identity from `initialize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Capabilities a server advertises. Only presence matters to mcpchat.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub prompts: Option<Value>,
    #[serde(default)]
    pub resources: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    #[serde(default)]
    pub server_info: ServerInfo,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// One page of a paginated `*/list` call.
pub trait ListPage: DeserializeOwned {
    type Item;

    const METHOD: &'static str;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsPage {
    #[serde(default)]
    tools: Vec<McpTool>,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl ListPage for ToolsPage {
    type Item = McpTool;

    const METHOD: &'static str = "tools/list";

    fn into_parts(self) -> (Vec<McpTool>, Option<String>) {
        (self.tools, self.next_cursor)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsPage {
    #[serde(default)]
    prompts: Vec<McpPrompt>,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl ListPage for PromptsPage {
    type Item = McpPrompt;

    const METHOD: &'static str = "prompts/list";

    fn into_parts(self) -> (Vec<McpPrompt>, Option<String>) {
        (self.prompts, self.next_cursor)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesPage {
    #[serde(default)]
    resources: Vec<McpResource>,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl ListPage for ResourcesPage {
    type Item = McpResource;

    const METHOD: &'static str = "resources/list";

    fn into_parts(self) -> (Vec<McpResource>, Option<String>) {
        (self.resources, self.next_cursor)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadResourceResult {
    #[serde(default)]
    pub contents: Vec<ResourceContent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_omits_missing_params() {
        let request = JsonRpcRequest::new(1, "tools/list", None);
        let json = serde_json::to_string(&JsonRpcMessage::Request(request)).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#);
    }

    #[test]
    fn test_classifies_message_shapes() {
        let request =
            JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": "a", "method": "ping"}))
                .unwrap();
        assert!(
            matches!(request, JsonRpcMessage::Request(r) if r.id == RequestId::String("a".into()))
        );

        let notification = JsonRpcMessage::from_value(
            json!({"jsonrpc": "2.0", "method": "notifications/tools/list_changed"}),
        )
        .unwrap();
        assert!(matches!(notification, JsonRpcMessage::Notification(_)));

        let response =
            JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": 7, "result": {}})).unwrap();
        assert!(
            matches!(response, JsonRpcMessage::Response(r) if r.id == Some(RequestId::Number(7)))
        );
    }

    #[test]
    fn test_error_response_parse() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .unwrap();
        let error = response.into_result().unwrap_err();
        assert_eq!(error.code, METHOD_NOT_FOUND);
    }

    #[test]
    fn test_parse_batch_frame() {
        let frame = r#"[{"jsonrpc":"2.0","id":1,"result":{}},{"jsonrpc":"2.0","method":"x"}]"#;
        let messages = JsonRpcMessage::parse_frame(frame).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(JsonRpcMessage::parse_frame("not json").is_err());
    }

    #[test]
    fn test_initialize_result_parse() {
        let result: InitializeResult = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {"listChanged": true}},
            "serverInfo": {"name": "everything", "version": "1.0.0"}
        }))
        .unwrap();
        assert_eq!(result.server_info.name, "everything");
        assert!(result.capabilities.tools.is_some());
        assert!(result.capabilities.prompts.is_none());
    }

    #[test]
    fn test_tools_page_with_cursor() {
        let page: ToolsPage = serde_json::from_value(json!({
            "tools": [{"name": "echo", "inputSchema": {"type": "object"}}],
            "nextCursor": "page-2"
        }))
        .unwrap();
        let (tools, cursor) = page.into_parts();
        assert_eq!(tools[0].name, "echo");
        assert_eq!(cursor.as_deref(), Some("page-2"));
    }
}
