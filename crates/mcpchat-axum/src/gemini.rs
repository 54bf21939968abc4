//! Gemini adapter for the language-model port.
//!
//! Tool mode uses one `generateContent` call per loop round; the plain chat
//! path streams `streamGenerateContent?alt=sse` chunks as text.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use mcpchat_core::{
    FunctionCallRequest, FunctionDeclaration, LlmError, LlmPort, LlmRequest, LlmResponse,
    TextStream, Turn, TurnPart, TurnRole,
};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Schema keywords the Gemini function-declaration format rejects.
const UNSUPPORTED_SCHEMA_KEYS: [&str; 5] = [
    "$schema",
    "$defs",
    "definitions",
    "additionalProperties",
    "default",
];

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_http_client(Client::new(), config)
    }

    pub const fn with_http_client(http: Client, config: GeminiConfig) -> Self {
        Self { http, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{method}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Response, LlmError> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LlmError::Api {
            status: status.as_u16(),
            message: api_error_message(&body),
        })
    }
}

#[async_trait]
impl LlmPort for GeminiClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = request_body(&request.contents, &request.functions);
        debug!(
            model = %self.config.model,
            turns = request.contents.len(),
            functions = request.functions.len(),
            "Calling Gemini generateContent"
        );
        let response = self.post(&self.endpoint("generateContent"), &body).await?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(parsed.into_llm_response())
    }

    async fn stream_text(&self, contents: Vec<Turn>) -> Result<TextStream, LlmError> {
        let body = request_body(&contents, &[]);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        debug!(model = %self.config.model, turns = contents.len(), "Streaming Gemini completion");
        let response = self.post(&url, &body).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => match serde_json::from_str::<GenerateResponse>(&event.data) {
                        Ok(chunk) => chunk.text().filter(|t| !t.is_empty()).map(Ok),
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed Gemini stream chunk");
                            None
                        }
                    },
                    Err(e) => Some(Err(LlmError::Http(e.to_string()))),
                }
            });
        Ok(Box::pin(stream))
    }
}

fn request_body(contents: &[Turn], functions: &[FunctionDeclaration]) -> Value {
    let contents: Vec<Value> = contents.iter().map(turn_to_content).collect();
    let mut body = json!({ "contents": contents });
    if !functions.is_empty() {
        let declarations: Vec<Value> = functions.iter().map(declaration_to_wire).collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }
    body
}

fn turn_to_content(turn: &Turn) -> Value {
    // Gemini carries function responses on user turns
    let role = match turn.role {
        TurnRole::User | TurnRole::Function => "user",
        TurnRole::Model => "model",
    };
    let parts: Vec<Value> = turn
        .parts
        .iter()
        .map(|part| match part {
            TurnPart::Text(text) => json!({ "text": text }),
            TurnPart::FunctionCall { id, name, args } => {
                let mut call = json!({ "name": name, "args": args });
                if let Some(id) = id {
                    call["id"] = json!(id);
                }
                json!({ "functionCall": call })
            }
            TurnPart::FunctionResponse { name, response } => {
                json!({ "functionResponse": { "name": name, "response": response } })
            }
        })
        .collect();
    json!({ "role": role, "parts": parts })
}

fn declaration_to_wire(declaration: &FunctionDeclaration) -> Value {
    let mut wire = json!({ "name": declaration.name });
    if let Some(description) = &declaration.description {
        wire["description"] = json!(description);
    }
    // An object schema without properties is rejected, so drop it
    if let Some(schema) = declaration
        .parameters
        .as_ref()
        .filter(|schema| !schema.properties.is_empty())
        && let Ok(mut parameters) = serde_json::to_value(schema)
    {
        strip_unsupported(&mut parameters);
        wire["parameters"] = parameters;
    }
    wire
}

fn strip_unsupported(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };
    for key in UNSUPPORTED_SCHEMA_KEYS {
        map.remove(key);
    }
    // Recurse into subschemas only; property names are left alone
    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        properties.values_mut().for_each(strip_unsupported);
    }
    if let Some(items) = map.get_mut("items") {
        strip_unsupported(items);
    }
    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(variants)) = map.get_mut(key) {
            variants.iter_mut().for_each(strip_unsupported);
        }
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<WireFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|content| content.parts.iter())
    }

    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self.parts().filter_map(|p| p.text.as_deref()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    fn into_llm_response(self) -> LlmResponse {
        let text = self.text();
        let function_calls = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.function_call)
            .map(|call| FunctionCallRequest {
                id: call.id,
                name: call.name,
                args: call.args,
            })
            .collect();
        LlmResponse {
            text,
            function_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpchat_core::{Conversation, ToolInputSchema};

    #[test]
    fn test_endpoint_uses_configured_base_url() {
        let client = GeminiClient::new(
            GeminiConfig::new("key")
                .with_model("gemini-2.5-flash")
                .with_base_url("http://localhost:8089/v1beta/"),
        );
        assert_eq!(client.model(), "gemini-2.5-flash");
        assert_eq!(
            client.endpoint("generateContent"),
            "http://localhost:8089/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body_maps_roles_and_parts() {
        let mut conversation = Conversation::default();
        conversation.push(Turn::text(TurnRole::User, "weather in Seoul?"));
        let mut args = Map::new();
        args.insert("city".into(), json!("Seoul"));
        conversation.push_function_call(None, "forecast", args);
        conversation.push_function_response("forecast", json!({"result": "sunny"}));

        let body = request_body(conversation.turns(), &[]);
        assert!(body.get("tools").is_none());
        assert_eq!(
            body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "weather in Seoul?"}]},
                {"role": "model", "parts": [{"functionCall": {"name": "forecast", "args": {"city": "Seoul"}}}]},
                {"role": "user", "parts": [{"functionResponse": {"name": "forecast", "response": {"result": "sunny"}}}]},
            ])
        );
    }

    #[test]
    fn test_declarations_strip_unsupported_schema_keys() {
        let schema: ToolInputSchema = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": "/tmp"},
                "opts": {"type": "object", "additionalProperties": false, "properties": {}},
                "default": {"type": "boolean"}
            },
            "required": ["path"]
        }))
        .unwrap();
        let functions = vec![
            FunctionDeclaration {
                name: "read_file".into(),
                description: Some("Read a file".into()),
                parameters: Some(schema),
            },
            FunctionDeclaration {
                name: "now".into(),
                description: None,
                parameters: Some(ToolInputSchema::default()),
            },
        ];

        let body = request_body(&[], &functions);
        let declarations = &body["tools"][0]["functionDeclarations"];
        assert_eq!(
            declarations[0]["parameters"],
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "opts": {"type": "object", "properties": {}},
                    "default": {"type": "boolean"}
                },
                "required": ["path"]
            })
        );
        assert_eq!(declarations[1], json!({"name": "now"}));
    }

    #[test]
    fn test_response_parsing_collects_text_and_calls() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Let me check. "},
                        {"functionCall": {"name": "forecast", "args": {"city": "Seoul"}}},
                        {"text": "One moment."}
                    ]
                },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        let response = response.into_llm_response();
        assert_eq!(response.text.as_deref(), Some("Let me check. One moment."));
        assert_eq!(response.function_calls.len(), 1);
        assert_eq!(response.function_calls[0].name, "forecast");
        assert_eq!(response.function_calls[0].args["city"], "Seoul");
        assert!(response.function_calls[0].id.is_none());
    }

    #[test]
    fn test_empty_candidates_yield_no_text() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.into_llm_response(), LlmResponse::default());
    }

    #[test]
    fn test_api_error_message_prefers_structured_error() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid");
        assert_eq!(api_error_message("upstream down"), "upstream down");
    }
}
