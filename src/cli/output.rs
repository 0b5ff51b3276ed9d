//! Output rendering for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::agent::task::{AgentState, ProgressSnapshot, SynthesisResult};
use crate::agent::tool::ToolDefinition;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name. Unknown names fall back to text.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON.
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}

/// Renders a finished orchestration.
pub fn format_result(result: &SynthesisResult, elapsed_secs: f64, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(result),
        OutputFormat::Text => {
            let agents: Vec<String> = result
                .contributing_agents
                .iter()
                .map(ToString::to_string)
                .collect();
            let mut output = result.final_answer.clone();
            let _ = write!(
                output,
                "\n\n---\nAgents: [{}]{} | Time: {elapsed_secs:.1}s",
                agents.join(", "),
                if result.degraded { " (degraded)" } else { "" },
            );
            output
        }
    }
}

/// One-line progress summary for logging.
pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    let tool_calls: usize = snapshot.tasks.iter().map(|t| t.tool_call_count()).sum();
    format!(
        "{phase}: {done}/{total} finished ({completed} completed, {failed} failed, {timed_out} timed out), {tool_calls} tool calls",
        phase = snapshot.phase,
        done = snapshot.terminal_count(),
        total = snapshot.tasks.len(),
        completed = snapshot.count_in(AgentState::Completed),
        failed = snapshot.count_in(AgentState::Failed),
        timed_out = snapshot.count_in(AgentState::TimedOut),
    )
}

/// Renders the tool catalogue.
pub fn format_tools(tools: &[ToolDefinition], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(&tools),
        OutputFormat::Text => {
            if tools.is_empty() {
                return "No tools registered.\n".to_string();
            }
            let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
            let mut output = String::new();
            for tool in tools {
                let _ = writeln!(output, "{:width$}  {}", tool.name, tool.description);
            }
            output
        }
    }
}
