// Wire shapes for one conversational turn
//
// Inbound: the browser posts `{ "message": "..." }`.
// Upstream: an OpenAI-compatible chat completions request built from the
// configured model and system prompt plus the user's message.

use serde::{Deserialize, Serialize};

use crate::config::UpstreamConfig;

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in the upstream conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body posted to the upstream chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl CompletionRequest {
    /// Build the single-turn request: configured system prompt, then the
    /// user's message.
    pub fn for_turn(upstream: &UpstreamConfig, message: &str, stream: bool) -> Self {
        Self {
            model: upstream.model.clone(),
            messages: vec![
                ChatMessage::new(Role::System, upstream.system_prompt.clone()),
                ChatMessage::new(Role::User, message),
            ],
            stream,
        }
    }
}

/// Inbound request body. `message` is kept as a raw value so a wrong type
/// is reported the same way as a missing field.
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl TurnRequest {
    /// The user's message, if present, a string, and not blank.
    pub fn message(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.as_str())
            .filter(|m| !m.trim().is_empty())
    }
}

/// Success body of the non-streaming endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicReply {
    pub success: bool,
    pub message: String,
}

/// Error body returned for every rejected request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Pull `choices[0].message.content` out of a non-streaming completion.
pub fn completion_content(response: &serde_json::Value) -> Option<&str> {
    response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
}
