//! Orchestration core.
//!
//! Splits one open-ended query into sub-questions, investigates each with a
//! tool-using agent running concurrently, and merges the results into one
//! answer. Backed by OpenAI-compatible inference endpoints.
//!
//! # Architecture
//!
//! ```text
//! OrchestrationRequest → Orchestrator
//!   ├── QuestionGenerator (exactly N distinct sub-questions)
//!   ├── Fan-out → N concurrent AgentWorkers
//!   │   ├── InferenceClient (primary, one fallback retry)
//!   │   ├── ToolBridge (sequential tool calls per step)
//!   │   └── ProgressReporter → ProgressTracker → snapshots
//!   ├── Join (or overall timeout / caller cancellation)
//!   └── SynthesisEngine → SynthesisResult
//!       └── on failure: longest completed result, degraded
//! ```

pub mod bridge;
pub mod client;
pub mod config;
pub mod message;
pub mod orchestrator;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod questions;
pub mod scaling;
pub mod synthesizer;
pub mod task;
pub mod tool;
pub mod traits;
pub mod worker;

// Re-export key types
pub use bridge::{ClockProvider, HttpToolProvider, HttpToolSpec, ToolBridge, ToolProvider};
pub use client::{Endpoint, InferenceClient, ModelTier, create_provider};
pub use config::{DEFAULT_MAX_AGENTS, HeavyConfig, HeavyConfigBuilder};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use progress::{ProgressReporter, ProgressTracker};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use questions::{QuestionAgent, QuestionGenerator};
pub use synthesizer::{SynthesisEngine, SynthesizerAgent};
pub use task::{
    AgentState, AgentTask, OrchestrationRequest, Phase, ProgressSnapshot, SynthesisEntry,
    SynthesisInput, SynthesisResult,
};
pub use tool::{ToolCall, ToolDefinition, ToolInvocation};
pub use traits::Agent;
pub use worker::{AgentWorker, ResearchAgent, WorkerLimits};
