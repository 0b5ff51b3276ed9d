//! Data model for one orchestration call.
//!
//! An [`OrchestrationRequest`] comes in, one [`AgentTask`] per sub-question is
//! created at fan-out, [`ProgressSnapshot`]s describe them while they run, and
//! a [`SynthesisResult`] goes out.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::client::ModelTier;
use crate::agent::message::TokenUsage;
use crate::agent::tool::ToolInvocation;
use crate::error::{ErrorKind, OrchestrationError, TimeoutScope};

/// Input for one orchestration call.
///
/// Unset fields are resolved by the orchestrator from its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationRequest {
    /// The open-ended query to investigate.
    pub query: String,
    /// Number of agents to fan out to. `None` selects a count from config or
    /// from the query profile.
    pub agent_count: Option<usize>,
    /// Per-agent timeout override.
    pub per_agent_timeout: Option<Duration>,
    /// Whole-call timeout override.
    pub overall_timeout: Option<Duration>,
    /// Which model the workers start on.
    pub model_preference: ModelTier,
}

impl OrchestrationRequest {
    /// Creates a request with every optional field unset.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            agent_count: None,
            per_agent_timeout: None,
            overall_timeout: None,
            model_preference: ModelTier::Primary,
        }
    }

    /// Sets the agent count.
    #[must_use]
    pub const fn with_agent_count(mut self, n: usize) -> Self {
        self.agent_count = Some(n);
        self
    }

    /// Sets the per-agent timeout.
    #[must_use]
    pub const fn with_per_agent_timeout(mut self, timeout: Duration) -> Self {
        self.per_agent_timeout = Some(timeout);
        self
    }

    /// Sets the whole-call timeout.
    #[must_use]
    pub const fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = Some(timeout);
        self
    }

    /// Sets the starting model tier.
    #[must_use]
    pub const fn with_model_preference(mut self, tier: ModelTier) -> Self {
        self.model_preference = tier;
        self
    }

    /// Checks the request against the admission ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::InvalidRequest`] for an empty query, an
    /// agent count outside `[1, max_agents]`, or a zero timeout.
    pub fn validate(&self, max_agents: usize) -> Result<(), OrchestrationError> {
        let invalid = |reason: String| Err(OrchestrationError::InvalidRequest { reason });

        if self.query.trim().is_empty() {
            return invalid("query must not be empty".to_string());
        }
        if let Some(n) = self.agent_count
            && !(1..=max_agents).contains(&n)
        {
            return invalid(format!("agentCount must be between 1 and {max_agents}, got {n}"));
        }
        if self.per_agent_timeout.is_some_and(|d| d.is_zero()) {
            return invalid("perAgentTimeout must be non-zero".to_string());
        }
        if self.overall_timeout.is_some_and(|d| d.is_zero()) {
            return invalid("overallTimeout must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Lifecycle state of one agent.
///
/// ```text
/// Pending → Running ⇄ ToolCall
///              ↓         ↓
///   Completed | Failed | TimedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentState {
    /// Created, not yet dispatched.
    Pending,
    /// Waiting on the model.
    Running,
    /// Executing the tool calls of the last response.
    ToolCall,
    /// Produced a final answer.
    Completed,
    /// Stopped with an error.
    Failed,
    /// A timer fired first.
    TimedOut,
}

impl AgentState {
    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Whether `self → next` is an edge of the state machine.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use AgentState::{Completed, Failed, Pending, Running, TimedOut, ToolCall};
        matches!(
            (self, next),
            (Pending, Running | Failed | TimedOut)
                | (Running, ToolCall | Completed | Failed | TimedOut)
                | (ToolCall, Running | Failed | TimedOut)
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ToolCall => "tool_call",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        };
        f.write_str(label)
    }
}

/// One sub-investigation and everything its worker recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    /// Unique task ID.
    pub id: Uuid,
    /// Position in the fan-out, `0..agentCount`.
    pub index: usize,
    /// The sub-question this agent investigates.
    pub sub_question: String,
    /// Current lifecycle state.
    pub state: AgentState,
    /// Model calls made so far.
    pub step_count: usize,
    /// Executed tool calls in order.
    pub tool_call_log: Vec<ToolInvocation>,
    /// Tokens spent across every model call of this agent.
    #[serde(default)]
    pub usage: TokenUsage,
    /// Final answer, set only on `Completed`.
    pub result: Option<String>,
    /// Terminal error, set on `Failed` and `TimedOut`.
    pub error: Option<ErrorKind>,
}

impl AgentTask {
    /// Creates a pending task.
    pub fn new(index: usize, sub_question: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            sub_question: sub_question.into(),
            state: AgentState::Pending,
            step_count: 0,
            tool_call_log: Vec::new(),
            usage: TokenUsage::default(),
            result: None,
            error: None,
        }
    }

    /// Moves to `next` if the state machine allows it.
    ///
    /// Returns `false` and leaves the task untouched otherwise.
    pub fn transition(&mut self, next: AgentState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }

    /// Records the final answer.
    pub fn complete(&mut self, answer: String) -> bool {
        if !self.transition(AgentState::Completed) {
            return false;
        }
        self.result = Some(answer);
        true
    }

    /// Records a terminal failure. Any partial output is discarded.
    pub fn fail(&mut self, kind: ErrorKind) -> bool {
        let next = if matches!(kind, ErrorKind::TimedOut { .. }) {
            AgentState::TimedOut
        } else {
            AgentState::Failed
        };
        if !self.transition(next) {
            return false;
        }
        self.result = None;
        self.error = Some(kind);
        true
    }

    /// Records a timeout of the given scope.
    pub fn time_out(&mut self, scope: TimeoutScope) -> bool {
        self.fail(ErrorKind::TimedOut { scope })
    }

    /// Whether this task counts toward synthesis.
    pub fn contributed(&self) -> bool {
        self.state == AgentState::Completed
            && self.result.as_deref().is_some_and(|r| !r.trim().is_empty())
    }

    /// Number of tool calls executed.
    pub fn tool_call_count(&self) -> usize {
        self.tool_call_log.len()
    }

    /// One-line description of why this task did not contribute.
    pub fn failure_summary(&self) -> String {
        match &self.error {
            Some(kind) => format!("agent {}: {kind}", self.index),
            None => format!("agent {}: ended {} without an answer", self.index, self.state),
        }
    }
}

/// Overall phase of an orchestration call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Generating sub-questions.
    #[default]
    Decomposing,
    /// Workers are running.
    Executing,
    /// Merging results.
    Synthesizing,
    /// Finished with a result.
    Done,
    /// Finished without a result.
    Failed,
}

impl Phase {
    /// Whether the call has finished.
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Decomposing => "decomposing",
            Self::Executing => "executing",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A consistent copy of every task plus the overall phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Overall phase.
    pub phase: Phase,
    /// Milliseconds since the tracker was created.
    pub elapsed_ms: u64,
    /// Task copies ordered by index.
    pub tasks: Vec<AgentTask>,
}

impl ProgressSnapshot {
    /// Number of tasks in a terminal state.
    pub fn terminal_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.state.is_terminal()).count()
    }

    /// Number of tasks in the given state.
    pub fn count_in(&self, state: AgentState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }
}

/// One row of the synthesis input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisEntry {
    /// The angle investigated.
    pub sub_question: String,
    /// The agent's answer, if it completed.
    pub result: Option<String>,
    /// Why the agent did not complete.
    pub error: Option<ErrorKind>,
}

/// Everything the synthesizer sees: one entry per task, in index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisInput {
    /// The original query.
    pub query: String,
    /// One entry per task, failed ones included.
    pub entries: Vec<SynthesisEntry>,
}

impl SynthesisInput {
    /// Builds the input from finished tasks ordered by index.
    pub fn from_tasks(query: &str, tasks: &[AgentTask]) -> Self {
        let entries = tasks
            .iter()
            .map(|t| SynthesisEntry {
                sub_question: t.sub_question.clone(),
                result: t.contributed().then(|| t.result.clone()).flatten(),
                error: t.error.clone(),
            })
            .collect();
        Self {
            query: query.to_string(),
            entries,
        }
    }

    /// Indices whose entry carries a non-empty result.
    pub fn contributing(&self) -> BTreeSet<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.result.as_deref().is_some_and(|r| !r.trim().is_empty()))
            .map(|(i, _)| i)
            .collect()
    }
}

/// The merged answer returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    /// The final answer.
    pub final_answer: String,
    /// Indices of the agents whose output the answer is based on.
    pub contributing_agents: BTreeSet<usize>,
    /// Whether the answer is based on fewer than all agents.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use AgentState::{Completed, Failed, Pending, Running, TimedOut, ToolCall};

    #[test_case(Pending, Running, true ; "dispatch")]
    #[test_case(Running, ToolCall, true ; "tool calls requested")]
    #[test_case(ToolCall, Running, true ; "tool results fed back")]
    #[test_case(Running, Completed, true ; "final answer")]
    #[test_case(ToolCall, TimedOut, true ; "timeout during tool call")]
    #[test_case(Pending, TimedOut, true ; "cancelled before start")]
    #[test_case(Pending, Completed, false ; "cannot complete without running")]
    #[test_case(ToolCall, Completed, false ; "cannot complete from tool call")]
    #[test_case(Completed, Running, false ; "completed is terminal")]
    #[test_case(Failed, TimedOut, false ; "failed is terminal")]
    #[test_case(TimedOut, Failed, false ; "timed out is terminal")]
    #[test_case(Running, Running, false ; "no self edge")]
    fn test_transitions(from: AgentState, to: AgentState, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut task = AgentTask::new(0, "solar cost trends");
        assert!(task.transition(Running));
        assert!(task.complete("answer".to_string()));
        assert!(!task.time_out(TimeoutScope::Call));
        assert_eq!(task.state, Completed);
        assert!(task.error.is_none());
        assert!(task.contributed());
    }

    #[test]
    fn test_fail_discards_partial_result() {
        let mut task = AgentTask::new(1, "wind cost trends");
        task.transition(Running);
        task.result = Some("partial".to_string());
        assert!(task.fail(ErrorKind::StepBudgetExceeded { max_steps: 3 }));
        assert_eq!(task.state, Failed);
        assert!(task.result.is_none());
        assert_eq!(task.failure_summary(), "agent 1: step budget of 3 model calls exceeded");
    }

    #[test]
    fn test_timed_out_kind_maps_to_timed_out_state() {
        let mut task = AgentTask::new(0, "q");
        task.transition(Running);
        assert!(task.time_out(TimeoutScope::Agent));
        assert_eq!(task.state, TimedOut);
    }

    #[test_case("", Some(2), 8 ; "empty query")]
    #[test_case("   ", None, 8 ; "blank query")]
    #[test_case("q", Some(0), 8 ; "zero agents")]
    #[test_case("q", Some(9), 8 ; "above ceiling")]
    fn test_validate_rejects(query: &str, agents: Option<usize>, max: usize) {
        let mut req = OrchestrationRequest::new(query);
        req.agent_count = agents;
        assert!(matches!(
            req.validate(max),
            Err(OrchestrationError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_bounds() {
        assert!(OrchestrationRequest::new("q").with_agent_count(1).validate(8).is_ok());
        assert!(OrchestrationRequest::new("q").with_agent_count(8).validate(8).is_ok());
        assert!(OrchestrationRequest::new("q").validate(8).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let req = OrchestrationRequest::new("q").with_overall_timeout(Duration::ZERO);
        assert!(req.validate(8).is_err());
    }

    #[test]
    fn test_synthesis_input_keeps_every_task() {
        let mut done = AgentTask::new(0, "a");
        done.transition(Running);
        done.complete("answer a".to_string());
        let mut empty = AgentTask::new(1, "b");
        empty.transition(Running);
        empty.complete("   ".to_string());
        let mut failed = AgentTask::new(2, "c");
        failed.time_out(TimeoutScope::Call);

        let input = SynthesisInput::from_tasks("q", &[done, empty, failed]);
        assert_eq!(input.entries.len(), 3);
        assert_eq!(input.contributing(), BTreeSet::from([0]));
        assert!(input.entries[2].error.is_some());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = ProgressSnapshot {
            phase: Phase::Executing,
            elapsed_ms: 5,
            tasks: vec![AgentTask::new(0, "q")],
        };
        let json = serde_json::to_value(&snapshot).unwrap_or_default();
        assert_eq!(json["phase"], "executing");
        assert_eq!(json["elapsedMs"], 5);
        assert_eq!(json["tasks"][0]["state"], "pending");
        assert_eq!(json["tasks"][0]["subQuestion"], "q");
    }
}
