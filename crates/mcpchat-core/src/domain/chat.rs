//! Chat conversation types.
//!
//! [`ChatMessage`] is what clients send and persist. [`Conversation`] is the
//! richer internal form fed back to the language model during a tool loop;
//! it also carries function call/response turns and is dropped once the loop
//! finishes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of an externally visible chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    #[serde(alias = "assistant")]
    Model,
}

/// A message as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

/// Who produced an internal turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
    /// Tool responses fed back to the model.
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnPart {
    Text(String),
    FunctionCall {
        id: Option<String>,
        name: String,
        args: Map<String, Value>,
    },
    FunctionResponse {
        name: String,
        response: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<TurnPart>,
}

impl Turn {
    pub fn text(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![TurnPart::Text(text.into())],
        }
    }
}

impl From<&ChatMessage> for Turn {
    fn from(message: &ChatMessage) -> Self {
        let role = match message.role {
            ChatRole::User => TurnRole::User,
            ChatRole::Model => TurnRole::Model,
        };
        Self::text(role, message.content.clone())
    }
}

/// Ordered internal conversation for one loop run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn from_messages(messages: &[ChatMessage]) -> Self {
        Self {
            turns: messages.iter().map(Turn::from).collect(),
        }
    }

    /// Prepend `instruction` to the first user turn, creating one if needed.
    pub fn inject_instruction(&mut self, instruction: impl Into<String>) {
        let part = TurnPart::Text(instruction.into());
        match self.turns.iter_mut().find(|t| t.role == TurnRole::User) {
            Some(turn) => turn.parts.insert(0, part),
            None => self.turns.insert(
                0,
                Turn {
                    role: TurnRole::User,
                    parts: vec![part],
                },
            ),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn push_function_call(
        &mut self,
        id: Option<String>,
        name: impl Into<String>,
        args: Map<String, Value>,
    ) {
        self.turns.push(Turn {
            role: TurnRole::Model,
            parts: vec![TurnPart::FunctionCall {
                id,
                name: name.into(),
                args,
            }],
        });
    }

    pub fn push_function_response(&mut self, name: impl Into<String>, response: Value) {
        self.turns.push(Turn {
            role: TurnRole::Function,
            parts: vec![TurnPart::FunctionResponse {
                name: name.into(),
                response,
            }],
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
