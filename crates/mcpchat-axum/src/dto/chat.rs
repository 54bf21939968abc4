//! Chat endpoint DTO.

use mcpchat_core::ChatMessage;
use serde::Deserialize;

use crate::error::HttpError;

/// `POST /api/chat` body.
///
/// `useMCPTools` defaults to on, matching the web client's toggle.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default = "default_use_tools", rename = "useMCPTools")]
    pub use_mcp_tools: bool,
}

const fn default_use_tools() -> bool {
    true
}

impl ChatRequest {
    /// The message history, or 400 when it is missing or empty.
    pub fn into_messages(self) -> Result<Vec<ChatMessage>, HttpError> {
        self.messages
            .filter(|messages| !messages.is_empty())
            .ok_or_else(|| HttpError::BadRequest("Messages array is required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tools_flag_defaults_on() {
        let request: ChatRequest =
            serde_json::from_value(json!({"messages": [{"role": "user", "content": "hi"}]}))
                .unwrap();
        assert!(request.use_mcp_tools);
        assert_eq!(request.into_messages().unwrap().len(), 1);
    }

    #[test]
    fn test_assistant_role_is_accepted() {
        let request: ChatRequest = serde_json::from_value(json!({
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ],
            "useMCPTools": false
        }))
        .unwrap();
        assert!(!request.use_mcp_tools);
        assert_eq!(request.into_messages().unwrap()[1], ChatMessage::model("hello"));
    }

    #[test]
    fn test_missing_messages_rejected() {
        let request: ChatRequest = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(request.into_messages(), Err(HttpError::BadRequest(_))));
    }
}
