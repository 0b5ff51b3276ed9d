//! Provider-agnostic message types for LLM communication.
//!
//! These types decouple the orchestration core from any specific LLM SDK.
//! A [`ChatRequest`] carries no model name: the [`InferenceClient`] picks
//! the endpoint and model from the requested tier.
//!
//! [`InferenceClient`]: super::client::InferenceClient

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolDefinition};

/// Role of a chat message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
    /// Tool result.
    Tool,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Message content.
    pub content: String,
    /// Tool calls requested by the assistant (only for `Role::Assistant`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool call ID this message responds to (only for `Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Generation settings sent with every completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    /// Sampling temperature (0.0–2.0).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Request JSON-formatted output.
    pub json_mode: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 2048,
            json_mode: false,
        }
    }
}

/// A chat completion request (provider-agnostic).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Tool definitions available to the model.
    pub tools: Vec<ToolDefinition>,
    /// Sampling and output settings.
    pub settings: GenerationSettings,
}

/// Token usage statistics from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Adds another usage record into this one, saturating on overflow.
    pub const fn accumulate(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// A chat completion response (provider-agnostic).
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Generated text content.
    pub content: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCall>,
    /// Finish reason from the model (e.g., `"stop"`, `"tool_calls"`).
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    /// Whether this response ends the reasoning loop.
    ///
    /// Tool calls always win over a `"stop"` finish reason. A response with
    /// no tool calls is final even without an explicit signal, unless it
    /// was cut off at the token limit.
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty() && !self.is_truncated()
    }

    /// Whether generation stopped at `max_tokens` mid-answer.
    pub fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

/// Creates a system message.
#[must_use]
pub fn system_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::System,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

/// Creates a user message.
#[must_use]
pub fn user_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::User,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

/// Creates a plain assistant message.
#[must_use]
pub const fn assistant_message(content: String) -> ChatMessage {
    assistant_tool_calls_message(content, Vec::new())
}

/// Creates an assistant message carrying tool calls and any interim text.
#[must_use]
pub const fn assistant_tool_calls_message(content: String, tool_calls: Vec<ToolCall>) -> ChatMessage {
    ChatMessage {
        role: Role::Assistant,
        content,
        tool_calls,
        tool_call_id: None,
    }
}

/// Creates a tool result message.
#[must_use]
pub fn tool_message(tool_call_id: &str, content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::Tool,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: Some(tool_call_id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message() {
        let msg = system_message("You are a research agent.");
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.content, "You are a research agent.");
        assert!(msg.tool_calls.is_empty());
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn test_tool_message() {
        let msg = tool_message("call_123", "{\"utc\":\"2026-01-01T00:00:00Z\"}");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
    }

    #[test]
    fn test_assistant_tool_calls_message_keeps_text() {
        let calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "current_time".to_string(),
            arguments: "{}".to_string(),
        }];
        let msg = assistant_tool_calls_message("Checking the date first.".to_string(), calls);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "Checking the date first.");
        assert_eq!(msg.tool_calls[0].name, "current_time");
    }

    #[test]
    fn test_is_final() {
        let mut response = ChatResponse {
            content: "answer".to_string(),
            finish_reason: Some("stop".to_string()),
            ..ChatResponse::default()
        };
        assert!(response.is_final());

        response.tool_calls.push(ToolCall {
            id: "c".to_string(),
            name: "t".to_string(),
            arguments: "{}".to_string(),
        });
        assert!(!response.is_final());
    }

    #[test]
    fn test_length_cutoff_is_not_final() {
        let response = ChatResponse {
            content: "Solar costs fell by".to_string(),
            finish_reason: Some("length".to_string()),
            ..ChatResponse::default()
        };
        assert!(response.is_truncated());
        assert!(!response.is_final());

        let unsignalled = ChatResponse {
            content: "answer".to_string(),
            ..ChatResponse::default()
        };
        assert!(unsignalled.is_final());
    }

    #[test]
    fn test_usage_accumulate_saturates() {
        let mut total = TokenUsage {
            prompt_tokens: u32::MAX - 1,
            completion_tokens: 1,
            total_tokens: 10,
        };
        total.accumulate(TokenUsage {
            prompt_tokens: 5,
            completion_tokens: 2,
            total_tokens: 3,
        });
        assert_eq!(total.prompt_tokens, u32::MAX);
        assert_eq!(total.completion_tokens, 3);
        assert_eq!(total.total_tokens, 13);
    }

    #[test]
    fn test_chat_message_serialization() {
        let msg = user_message("test");
        let json = serde_json::to_string(&msg).unwrap_or_default();
        assert!(json.contains("\"user\""));
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }
}
