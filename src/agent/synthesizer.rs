//! Synthesis: merges the per-agent answers into one response.
//!
//! One model call sees every sub-question with its answer, or an explicit
//! incomplete marker for agents that did not finish. If that call fails the
//! caller still gets an answer: the longest completed result, verbatim and
//! marked degraded.

use std::cmp::Reverse;

use async_trait::async_trait;
use tracing::{info, warn};

use super::client::{InferenceClient, ModelTier};
use super::prompt::build_synthesis_prompt;
use super::task::{SynthesisInput, SynthesisResult};
use super::traits::Agent;
use crate::error::AgentError;

/// Role that writes the merged answer.
pub struct SynthesizerAgent {
    max_tokens: u32,
    system_prompt: String,
}

impl SynthesizerAgent {
    /// Creates the role with the given system prompt.
    pub const fn new(max_tokens: u32, system_prompt: String) -> Self {
        Self {
            max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for SynthesizerAgent {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Produces a [`SynthesisResult`] from a [`SynthesisInput`].
pub struct SynthesisEngine {
    agent: SynthesizerAgent,
}

impl SynthesisEngine {
    /// Creates an engine for the given role.
    pub const fn new(agent: SynthesizerAgent) -> Self {
        Self { agent }
    }

    /// Runs the synthesis call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the call fails or the model answers with
    /// nothing. Callers recover with [`longest_result`].
    pub async fn synthesize(
        &self,
        client: &InferenceClient,
        tier: ModelTier,
        input: &SynthesisInput,
    ) -> Result<SynthesisResult, AgentError> {
        let contributing_agents = input.contributing();
        let response = self
            .agent
            .execute(client, tier, &build_synthesis_prompt(input))
            .await?;

        let final_answer = response.content.trim().to_string();
        if final_answer.is_empty() {
            return Err(AgentError::ResponseParse {
                message: "synthesizer returned an empty answer".to_string(),
                content: response.content,
            });
        }

        let degraded = contributing_agents.len() != input.entries.len();
        info!(
            contributing = contributing_agents.len(),
            total = input.entries.len(),
            degraded,
            answer_chars = final_answer.len(),
            "synthesis complete"
        );
        Ok(SynthesisResult {
            final_answer,
            contributing_agents,
            degraded,
        })
    }
}

/// The longest non-empty agent result, verbatim, marked degraded.
///
/// Ties go to the lower index. Returns `None` if no entry has a result.
pub fn longest_result(input: &SynthesisInput) -> Option<SynthesisResult> {
    let (index, answer) = input
        .entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.result.as_deref().map(|r| (i, r)))
        .filter(|(_, r)| !r.trim().is_empty())
        .max_by_key(|(i, r)| (r.len(), Reverse(*i)))?;

    warn!(agent = index, "falling back to the longest agent result");
    Some(SynthesisResult {
        final_answer: answer.to_string(),
        contributing_agents: std::iter::once(index).collect(),
        degraded: true,
    })
}
