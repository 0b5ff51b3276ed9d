//! Tool type definitions for function-calling.
//!
//! Provides provider-agnostic types for tool definitions, the calls a model
//! requests, and the [`ToolInvocation`] record appended to an agent's log.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique across the bridge).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// One executed tool call, as recorded in an agent's tool-call log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    /// Provider-assigned call ID.
    pub call_id: String,
    /// Tool name as requested.
    pub tool_name: String,
    /// Parsed parameters (empty when the arguments were not a JSON object).
    pub parameters: Map<String, Value>,
    /// Tool output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    /// Wall-clock latency of the invocation.
    #[serde(rename = "latencyMs", with = "duration_millis")]
    pub latency: Duration,
}

impl ToolInvocation {
    /// Whether the invocation succeeded.
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Renders the outcome as the content of a tool message fed back to the model.
    pub fn to_message_content(&self) -> String {
        match (&self.result, &self.error) {
            (_, Some(err)) => format!("ERROR: {err}"),
            (Some(Value::String(s)), None) => s.clone(),
            (Some(value), None) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            (None, None) => "null".to_string(),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
