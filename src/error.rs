//! Error types for heavy-rs.
//!
//! Errors are split by the boundary they cross:
//!
//! - [`AgentError`]: inference-side failures (provider, configuration, timeouts).
//! - [`ToolError`]: a single tool invocation failed.
//! - [`ErrorKind`]: the terminal error recorded on an agent task. Never
//!   propagated as a Rust error across the agent boundary.
//! - [`OrchestrationError`]: the only failures surfaced to a caller.
//! - [`CommandError`]: CLI failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for CLI commands.
pub type Result<T, E = CommandError> = std::result::Result<T, E>;

/// Errors raised while talking to an inference backend.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured.
    #[error("API key missing: set OPENAI_API_KEY or HEAVY_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name is not known.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// The API request failed (network, non-2xx).
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error message from the transport or API.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The response could not be interpreted.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// The call exceeded its latency bound.
    #[error("inference call timed out after {after:?}")]
    Timeout {
        /// The bound that was exceeded.
        after: Duration,
    },

    /// The call was abandoned because its orchestration was cancelled.
    #[error("inference call cancelled")]
    Cancelled,

    /// Invalid configuration value.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the invalid value.
        message: String,
    },
}

/// Category of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolErrorKind {
    /// No registered tool has this name.
    NotFound,
    /// The model supplied arguments the tool cannot use.
    InvalidArguments,
    /// The tool ran and reported an error.
    Execution,
    /// The tool provider could not be reached at all.
    Unavailable,
    /// The invocation exceeded the caller's tool timeout.
    Timeout,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NotFound => "not found",
            Self::InvalidArguments => "invalid arguments",
            Self::Execution => "execution failed",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timed out",
        };
        f.write_str(label)
    }
}

/// A failed tool invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("tool `{tool}` {kind}: {message}")]
pub struct ToolError {
    /// Tool name as requested by the model.
    pub tool: String,
    /// Failure category.
    pub kind: ToolErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl ToolError {
    /// Creates a tool error.
    pub fn new(tool: impl Into<String>, kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            kind,
            message: message.into(),
        }
    }

    /// Whether this failure means the provider itself is unreachable.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self.kind, ToolErrorKind::Unavailable)
    }
}

/// Which timer fired for a timed-out agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeoutScope {
    /// The agent's own `perAgentTimeout`.
    Agent,
    /// The call-wide `overallTimeout` or a caller cancellation.
    Call,
}

/// Terminal error recorded on an agent task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ErrorKind {
    /// Inference failed on the primary and on the single fallback retry.
    InferenceError {
        /// Last error message.
        message: String,
    },
    /// Every tool call in one step hit an unavailable provider.
    ToolUnavailable {
        /// Names of the tools that were unreachable.
        tools: Vec<String>,
    },
    /// The model kept requesting tools past the step ceiling.
    StepBudgetExceeded {
        /// The ceiling that was reached.
        max_steps: usize,
    },
    /// A timer fired before the agent finished.
    TimedOut {
        /// Which timer fired.
        scope: TimeoutScope,
    },
    /// The worker task died without reporting (panic or abort).
    Internal {
        /// Join error detail.
        message: String,
    },
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InferenceError { message } => write!(f, "inference error: {message}"),
            Self::ToolUnavailable { tools } => {
                write!(f, "tools unavailable: {}", tools.join(", "))
            }
            Self::StepBudgetExceeded { max_steps } => {
                write!(f, "step budget of {max_steps} model calls exceeded")
            }
            Self::TimedOut {
                scope: TimeoutScope::Agent,
            } => f.write_str("agent timed out"),
            Self::TimedOut {
                scope: TimeoutScope::Call,
            } => f.write_str("cancelled by overall timeout"),
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

/// Call-level failures surfaced to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    /// The request was rejected before any work started.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Why the request was rejected.
        reason: String,
    },

    /// No agent reached `Completed`.
    #[error("all {} agents failed: {}", failures.len(), failures.join("; "))]
    AllAgentsFailed {
        /// One line per agent describing its failure.
        failures: Vec<String>,
    },
}

impl OrchestrationError {
    /// Stable identifier for API responses.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "InvalidRequest",
            Self::AllAgentsFailed { .. } => "AllAgentsFailed",
        }
    }
}

/// Errors from CLI command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not be completed.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),

    /// Configuration problem.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The orchestration itself failed.
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serializes_tagged() {
        let kind = ErrorKind::StepBudgetExceeded { max_steps: 10 };
        let json = serde_json::to_string(&kind).unwrap_or_default();
        assert!(json.contains("\"kind\":\"stepBudgetExceeded\""));
        assert!(json.contains("\"maxSteps\":10"));
    }

    #[test]
    fn test_timed_out_display() {
        let kind = ErrorKind::TimedOut {
            scope: TimeoutScope::Call,
        };
        assert_eq!(kind.to_string(), "cancelled by overall timeout");
    }

    #[test]
    fn test_all_agents_failed_message() {
        let err = OrchestrationError::AllAgentsFailed {
            failures: vec!["agent 0: timed out".into(), "agent 1: boom".into()],
        };
        assert_eq!(err.kind(), "AllAgentsFailed");
        assert!(err.to_string().starts_with("all 2 agents failed"));
    }

    #[test]
    fn test_tool_error_unavailable() {
        let err = ToolError::new("browser", ToolErrorKind::Unavailable, "connection refused");
        assert!(err.is_unavailable());
        assert_eq!(
            err.to_string(),
            "tool `browser` unavailable: connection refused"
        );
    }
}
