//! Tool, prompt and resource payloads returned by MCP servers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One item of a tool result or prompt message.
///
/// Wire payloads are tagged by a `type` string; anything mcpchat does not
/// model explicitly lands in [`ToolContent::Unknown`] with its raw JSON kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        uri: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Unknown {
        kind: String,
        raw: Value,
    },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Parse one wire content item.
    ///
    /// Accepts embedded resources (`{"type":"resource","resource":{...}}`),
    /// resource links, and a flat `uri` on resource items.
    pub fn from_wire(value: Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let parsed = match kind.as_str() {
            "text" => str_field(&value, "text").map(|text| Self::Text { text }),
            "image" => binary(&value).map(|(data, mime_type)| Self::Image { data, mime_type }),
            "audio" => binary(&value).map(|(data, mime_type)| Self::Audio { data, mime_type }),
            "resource" => {
                let inner = value.get("resource").unwrap_or(&value);
                str_field(inner, "uri").map(|uri| Self::Resource {
                    uri,
                    mime_type: str_field(inner, "mimeType"),
                    text: str_field(inner, "text"),
                })
            }
            "resource_link" => str_field(&value, "uri").map(|uri| Self::Resource {
                uri,
                mime_type: str_field(&value, "mimeType"),
                text: None,
            }),
            _ => None,
        };

        parsed.unwrap_or(Self::Unknown { kind, raw: value })
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn binary(value: &Value) -> Option<(String, String)> {
    Some((str_field(value, "data")?, str_field(value, "mimeType")?))
}

impl<'de> Deserialize<'de> for ToolContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_wire)
    }
}

/// Raw outcome of one `tools/call`, with the server's `isError` kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    /// Single-text error output.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(message)],
            is_error: true,
        }
    }
}

/// A tool invocation requested by the model in one loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

/// Result of executing a [`ToolCall`].
///
/// `result` is the model-facing flattening of `contents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub name: String,
    pub result: String,
    #[serde(default)]
    pub contents: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: ToolContent,
}

/// A prompt template resolved server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

/// One content block returned by `resources/read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContent {
    Text {
        uri: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        text: String,
    },
    Blob {
        uri: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// Base64-encoded bytes.
        blob: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_content_kinds() {
        let items: Vec<ToolContent> = serde_json::from_value(json!([
            {"type": "text", "text": "hello"},
            {"type": "image", "data": "iVBORw0", "mimeType": "image/png"},
            {"type": "resource", "resource": {"uri": "file:///a.txt", "mimeType": "text/plain", "text": "a"}},
            {"type": "resource_link", "uri": "file:///b.txt", "name": "b"}
        ]))
        .unwrap();

        assert_eq!(items[0], ToolContent::text("hello"));
        assert!(matches!(&items[1], ToolContent::Image { mime_type, .. } if mime_type == "image/png"));
        assert_eq!(
            items[2],
            ToolContent::Resource {
                uri: "file:///a.txt".into(),
                mime_type: Some("text/plain".into()),
                text: Some("a".into()),
            }
        );
        assert!(matches!(&items[3], ToolContent::Resource { uri, .. } if uri == "file:///b.txt"));
    }

    #[test]
    fn test_unrecognized_content_is_preserved() {
        let raw = json!({"type": "chart", "series": [1, 2]});
        let content = ToolContent::from_wire(raw.clone());
        assert_eq!(
            content,
            ToolContent::Unknown {
                kind: "chart".into(),
                raw
            }
        );

        // Known tag with missing fields also degrades instead of failing
        let content = ToolContent::from_wire(json!({"type": "image"}));
        assert!(matches!(content, ToolContent::Unknown { kind, .. } if kind == "image"));
    }

    #[test]
    fn test_content_serializes_with_type_tag() {
        let json = serde_json::to_value(ToolContent::Image {
            data: "AAA".into(),
            mime_type: "image/jpeg".into(),
        })
        .unwrap();
        assert_eq!(json, json!({"type": "image", "data": "AAA", "mimeType": "image/jpeg"}));
    }

    #[test]
    fn test_tool_output_keeps_server_error_flag() {
        let output: ToolOutput = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "file not found"}],
            "isError": true
        }))
        .unwrap();
        assert!(output.is_error);
        assert_eq!(output.content.len(), 1);

        let output: ToolOutput = serde_json::from_value(json!({"content": []})).unwrap();
        assert!(!output.is_error);
    }

    #[test]
    fn test_resource_content_variants() {
        let contents: Vec<ResourceContent> = serde_json::from_value(json!([
            {"uri": "file:///notes.md", "mimeType": "text/markdown", "text": "# Notes"},
            {"uri": "file:///logo.png", "mimeType": "image/png", "blob": "iVBOR"}
        ]))
        .unwrap();

        assert!(matches!(&contents[0], ResourceContent::Text { text, .. } if text == "# Notes"));
        assert!(matches!(&contents[1], ResourceContent::Blob { blob, .. } if blob == "iVBOR"));
        assert!(matches!(&contents[1], ResourceContent::Blob { uri, .. } if uri == "file:///logo.png"));
    }

    #[test]
    fn test_tool_call_result_wire_names() {
        let result = ToolCallResult {
            tool_call_id: "call-0-0".into(),
            name: "echo".into(),
            result: "hi".into(),
            contents: vec![ToolContent::text("hi")],
            is_error: false,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["toolCallId"], "call-0-0");
        assert_eq!(json["isError"], false);
        assert_eq!(json["contents"][0]["type"], "text");
    }
}
