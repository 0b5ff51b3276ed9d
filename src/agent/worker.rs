//! Agent worker: one bounded reasoning loop over one sub-question.
//!
//! The loop follows the usual tool-calling round trip: send the context to
//! the model, execute any requested tool calls in order, feed the results
//! back, repeat. It ends when the model answers without tool calls, the step
//! budget runs out, a non-recoverable error occurs, or a timer fires.
//!
//! Two timers race the loop: the worker's own `per_agent_timeout`, armed at
//! `Pending → Running`, and the call-wide cancellation token. Whichever fires
//! first drops the loop future, which aborts the in-flight model or tool
//! call for this agent only.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bridge::ToolBridge;
use super::client::{InferenceClient, ModelTier};
use super::message::{
    ChatRequest, ChatResponse, assistant_message, assistant_tool_calls_message, tool_message,
    user_message,
};
use super::progress::ProgressReporter;
use super::prompt::{CONTINUE_PROMPT, build_worker_prompt};
use super::task::{AgentState, AgentTask};
use super::traits::Agent;
use crate::error::{ErrorKind, TimeoutScope};

/// Research role run by every worker.
pub struct ResearchAgent {
    max_tokens: u32,
    system_prompt: String,
}

impl ResearchAgent {
    /// Creates the role with the given system prompt.
    pub const fn new(max_tokens: u32, system_prompt: String) -> Self {
        Self {
            max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn name(&self) -> &'static str {
        "researcher"
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Per-worker bounds.
#[derive(Debug, Clone, Copy)]
pub struct WorkerLimits {
    /// Model-call ceiling.
    pub max_steps: usize,
    /// Wall-clock bound from `Running` to a terminal state.
    pub per_agent_timeout: Duration,
    /// Bound on a single tool call.
    pub tool_timeout: Duration,
    /// Tier the first model call goes to.
    pub starting_tier: ModelTier,
}

/// Runs one [`AgentTask`] to a terminal state.
#[derive(Clone)]
pub struct AgentWorker {
    client: Arc<InferenceClient>,
    bridge: Arc<ToolBridge>,
    agent: Arc<ResearchAgent>,
    limits: WorkerLimits,
    reporter: ProgressReporter,
}

impl AgentWorker {
    /// Creates a worker.
    pub const fn new(
        client: Arc<InferenceClient>,
        bridge: Arc<ToolBridge>,
        agent: Arc<ResearchAgent>,
        limits: WorkerLimits,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            client,
            bridge,
            agent,
            limits,
            reporter,
        }
    }

    /// Drives `task` from `Pending` to a terminal state and returns it.
    ///
    /// Never fails: every outcome is recorded on the task.
    pub async fn run(self, mut task: AgentTask, query: Arc<str>, cancel: CancellationToken) -> AgentTask {
        let start = Instant::now();

        if cancel.is_cancelled() {
            task.time_out(TimeoutScope::Call);
            self.reporter.report(&task);
            return task;
        }

        task.transition(AgentState::Running);
        self.reporter.report(&task);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ErrorKind::TimedOut { scope: TimeoutScope::Call }),
            () = tokio::time::sleep(self.limits.per_agent_timeout) => {
                Err(ErrorKind::TimedOut { scope: TimeoutScope::Agent })
            }
            result = self.reason(&mut task, &query) => result,
        };

        let elapsed_ms = start.elapsed().as_millis();
        match outcome {
            Ok(answer) => {
                task.complete(answer);
                info!(
                    agent = task.index,
                    steps = task.step_count,
                    tokens = task.usage.total_tokens,
                    %elapsed_ms,
                    "agent completed"
                );
            }
            Err(kind) => {
                warn!(
                    agent = task.index,
                    steps = task.step_count,
                    tokens = task.usage.total_tokens,
                    %elapsed_ms,
                    error = %kind,
                    "agent did not complete"
                );
                task.fail(kind);
            }
        }
        self.reporter.report(&task);
        task
    }

    /// Calls the model, retrying once on the fallback tier per agent lifetime.
    async fn infer(
        &self,
        task: &AgentTask,
        tier: &mut ModelTier,
        retried: &mut bool,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ErrorKind> {
        match self.client.complete(*tier, request).await {
            Ok(response) => Ok(response),
            Err(e) if !*retried => {
                *retried = true;
                *tier = ModelTier::Fallback;
                warn!(agent = task.index, error = %e, "inference failed, retrying on fallback model");
                self.client
                    .complete(*tier, request)
                    .await
                    .map_err(|e| ErrorKind::InferenceError {
                        message: e.to_string(),
                    })
            }
            Err(e) => Err(ErrorKind::InferenceError {
                message: e.to_string(),
            }),
        }
    }

    async fn reason(&self, task: &mut AgentTask, query: &str) -> Result<String, ErrorKind> {
        let mut request = self.agent.request(
            &build_worker_prompt(query, &task.sub_question),
            self.bridge.definitions().to_vec(),
        );
        let mut tier = self.limits.starting_tier;
        let mut retried = false;
        let max_steps = self.limits.max_steps;
        // text of earlier replies cut off at the token limit
        let mut partial = String::new();

        for step in 1..=max_steps {
            task.step_count = step;
            self.reporter.report(task);

            let response = self.infer(task, &mut tier, &mut retried, &request).await?;
            task.usage.accumulate(response.usage);

            if response.is_final() {
                debug!(agent = task.index, step, "final answer");
                partial.push_str(&response.content);
                return Ok(partial);
            }
            if step == max_steps {
                break;
            }

            if response.tool_calls.is_empty() {
                debug!(agent = task.index, step, "reply truncated, asking for the rest");
                partial.push_str(&response.content);
                request.messages.push(assistant_message(response.content));
                request.messages.push(user_message(CONTINUE_PROMPT));
                continue;
            }

            task.transition(AgentState::ToolCall);
            self.reporter.report(task);
            debug!(
                agent = task.index,
                step,
                tool_count = response.tool_calls.len(),
                "executing tool calls"
            );

            request.messages.push(assistant_tool_calls_message(
                response.content,
                response.tool_calls.clone(),
            ));

            let mut unavailable = Vec::new();
            for call in &response.tool_calls {
                let invocation =
                    match tokio::time::timeout(self.limits.tool_timeout, self.bridge.invoke(call)).await {
                        Ok(invocation) => invocation,
                        Err(_) => ToolBridge::timed_out(call, self.limits.tool_timeout),
                    };
                if invocation.error.as_ref().is_some_and(|e| e.is_unavailable()) {
                    unavailable.push(call.name.clone());
                }
                request
                    .messages
                    .push(tool_message(&call.id, &invocation.to_message_content()));
                task.tool_call_log.push(invocation);
                self.reporter.report(task);
            }

            if unavailable.len() == response.tool_calls.len() {
                return Err(ErrorKind::ToolUnavailable { tools: unavailable });
            }

            task.transition(AgentState::Running);
            self.reporter.report(task);
        }

        Err(ErrorKind::StepBudgetExceeded { max_steps })
    }
}
