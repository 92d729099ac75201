pub mod openai;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
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

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Outbound payload of one completion, serialized as-is onto the wire.
#[derive(Clone, Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [ChatMessage], temperature: f32) -> Self {
        Self {
            model,
            messages,
            temperature: temperature.clamp(0.0, 1.0),
        }
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.messages.is_empty() {
            return Err(ChatError::validation("history must contain at least one message"));
        }
        if self.model.trim().is_empty() {
            return Err(ChatError::configuration("model identifier is empty"));
        }
        Ok(())
    }
}

/// One request in, exactly one assistant message out. Implementations hold
/// no conversation state between calls.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<ChatMessage, ChatError>;
}
