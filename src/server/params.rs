//! Request and response bodies for the orchestration API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::client::ModelTier;
use crate::agent::task::OrchestrationRequest;

/// Body of `POST /orchestrate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrateParams {
    /// The query to investigate.
    pub query: String,

    /// Number of agents; derived from the query when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_count: Option<usize>,

    /// Whole-call timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Per-agent timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_timeout_seconds: Option<u64>,

    /// `"primary"` (default) or `"fallback"`.
    #[serde(default)]
    pub model_preference: ModelTier,
}

impl OrchestrateParams {
    /// Converts the body into an [`OrchestrationRequest`].
    pub fn into_request(self) -> OrchestrationRequest {
        OrchestrationRequest {
            query: self.query,
            agent_count: self.agent_count,
            per_agent_timeout: self.agent_timeout_seconds.map(Duration::from_secs),
            overall_timeout: self.timeout_seconds.map(Duration::from_secs),
            model_preference: self.model_preference,
        }
    }
}

/// `202` acknowledgement for an accepted call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    /// Handle for polling.
    pub task_id: Uuid,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error identifier (`InvalidRequest`, `AllAgentsFailed`, `NotFound`).
    pub error: String,
    /// Human-readable detail.
    pub reason: String,
}

/// Body returned while a call is still running.
#[derive(Debug, Clone, Serialize)]
pub struct Pending {
    /// Always `"pending"`.
    pub status: &'static str,
}
