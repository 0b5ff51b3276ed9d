//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. This keeps all agent logic decoupled
//! from any particular LLM vendor.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer for a specific provider while
/// presenting a uniform interface to agents. They must be safe for
/// concurrent use: every agent worker shares the same provider value.
/// Dropping the future returned by [`LlmProvider::chat`] must abort the
/// in-flight request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request against `model`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or parse errors.
    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Checks that the backend is reachable and serving.
    ///
    /// The default implementation assumes availability.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the backend reports itself unavailable.
    async fn health_check(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
