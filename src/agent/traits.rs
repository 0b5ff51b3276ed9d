//! Agent role trait.
//!
//! Each role (question generator, research worker, synthesizer) carries a
//! fixed system prompt and generation settings. The role decides *what* is
//! asked; the [`InferenceClient`] decides *where* it is sent.

use async_trait::async_trait;

use super::client::{InferenceClient, ModelTier};
use super::message::{
    ChatRequest, GenerationSettings, TokenUsage, system_message, user_message,
};
use super::tool::ToolDefinition;
use crate::error::AgentError;

/// Response from a single-shot role execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The role's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by every role in the pipeline.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Role name for logging.
    fn name(&self) -> &'static str;

    /// System prompt that defines the role's behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Generation settings derived from the role's configuration.
    fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: self.temperature(),
            max_tokens: self.max_tokens(),
            json_mode: self.json_mode(),
        }
    }

    /// Builds the opening request for `user_msg` with the given tools.
    fn request(&self, user_msg: &str, tools: Vec<ToolDefinition>) -> ChatRequest {
        ChatRequest {
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            tools,
            settings: self.settings(),
        }
    }

    /// Executes the role once, without tools.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or timeouts.
    async fn execute(
        &self,
        client: &InferenceClient,
        tier: ModelTier,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = self.request(user_msg, Vec::new());
        let response = client.complete(tier, &request).await?;

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}
