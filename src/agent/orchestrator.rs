//! Orchestrator for decompose → execute → synthesize calls.
//!
//! One call validates the request, splits the query into sub-questions,
//! fans out one [`AgentWorker`] per sub-question, waits for all of them or
//! the overall timeout, and merges whatever completed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bridge::ToolBridge;
use super::client::{InferenceClient, ModelTier};
use super::config::HeavyConfig;
use super::message::TokenUsage;
use super::progress::ProgressTracker;
use super::prompt::PromptSet;
use super::questions::{QuestionAgent, QuestionGenerator, fallback_questions};
use super::scaling::recommended_agent_count;
use super::synthesizer::{SynthesisEngine, SynthesizerAgent, longest_result};
use super::task::{
    AgentState, AgentTask, OrchestrationRequest, Phase, SynthesisInput, SynthesisResult,
};
use super::worker::{AgentWorker, ResearchAgent, WorkerLimits};
use crate::error::{AgentError, ErrorKind, OrchestrationError, TimeoutScope};

/// Runs orchestration calls against a shared client and tool bridge.
///
/// Holds no per-call state; one instance serves any number of concurrent
/// calls.
pub struct Orchestrator {
    client: Arc<InferenceClient>,
    bridge: Arc<ToolBridge>,
    config: HeavyConfig,
    prompts: PromptSet,
}

impl Orchestrator {
    /// Creates an orchestrator.
    ///
    /// Loads prompt templates from [`HeavyConfig::prompt_dir`], falling back
    /// to compiled-in defaults.
    pub fn new(client: Arc<InferenceClient>, bridge: Arc<ToolBridge>, config: HeavyConfig) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_prompts(client, bridge, config, prompts)
    }

    /// Creates an orchestrator with explicit prompts.
    pub const fn with_prompts(
        client: Arc<InferenceClient>,
        bridge: Arc<ToolBridge>,
        config: HeavyConfig,
        prompts: PromptSet,
    ) -> Self {
        Self {
            client,
            bridge,
            config,
            prompts,
        }
    }

    /// The configuration this orchestrator was built with.
    pub const fn config(&self) -> &HeavyConfig {
        &self.config
    }

    /// Checks `req` against the admission ceiling without running it.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::InvalidRequest`] on a bad request.
    pub fn validate(&self, req: &OrchestrationRequest) -> Result<(), OrchestrationError> {
        req.validate(self.config.max_agents)
    }

    /// Agent count for `req`: request, then configured default, then
    /// dynamic sizing. Always within `[1, max_agents]`.
    pub fn resolve_agent_count(&self, req: &OrchestrationRequest) -> usize {
        let max_agents = self.config.max_agents.max(1);
        req.agent_count
            .or(self.config.default_agent_count)
            .map_or_else(
                || recommended_agent_count(&req.query, max_agents),
                |n| n.clamp(1, max_agents),
            )
    }

    /// Runs one call with a private tracker and no caller cancellation.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::execute_with`].
    pub async fn execute(&self, req: OrchestrationRequest) -> Result<SynthesisResult, OrchestrationError> {
        self.execute_with(req, &ProgressTracker::new(), CancellationToken::new())
            .await
    }

    /// Runs one call, reporting to `tracker`.
    ///
    /// The overall timeout is armed once validation passes and bounds
    /// decomposition, execution and synthesis together. When it fires, or
    /// `cancel` is cancelled, decomposition falls back to templated
    /// sub-questions, running agents time out with call scope, and synthesis
    /// falls back to the longest completed result.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::InvalidRequest`] before any work starts,
    /// or [`OrchestrationError::AllAgentsFailed`] when no agent produced an
    /// answer. Synthesis failures are never returned.
    pub async fn execute_with(
        &self,
        req: OrchestrationRequest,
        tracker: &ProgressTracker,
        cancel: CancellationToken,
    ) -> Result<SynthesisResult, OrchestrationError> {
        if let Err(e) = self.validate(&req) {
            warn!(error = %e, "rejecting request");
            tracker.set_phase(Phase::Failed);
            return Err(e);
        }

        let start = Instant::now();
        let tier = req.model_preference;
        let n = self.resolve_agent_count(&req);
        let overall_timeout = req.overall_timeout.unwrap_or(self.config.overall_timeout);
        info!(agents = n, tier = %tier, "orchestration started");

        let call = cancel.child_token();
        // stops the watchdog on every return path
        let _disarm = call.clone().drop_guard();
        arm_overall_timeout(call.clone(), overall_timeout);

        // Decompose
        tracker.set_phase(Phase::Decomposing);
        let questions = self.decompose(&req.query, tier, n, &call).await;

        // Execute
        let tasks: Vec<AgentTask> = questions
            .into_iter()
            .enumerate()
            .map(|(index, question)| AgentTask::new(index, question))
            .collect();
        for task in &tasks {
            tracker.register(task);
        }
        tracker.set_phase(Phase::Executing);

        let limits = WorkerLimits {
            max_steps: self.config.max_steps,
            per_agent_timeout: req
                .per_agent_timeout
                .unwrap_or(self.config.per_agent_timeout),
            tool_timeout: self.config.tool_timeout,
            starting_tier: tier,
        };
        let finished = self
            .fan_out(&req.query, tasks, limits, tracker, &call)
            .await;

        let completed = finished.iter().filter(|t| t.contributed()).count();
        let mut usage = TokenUsage::default();
        for task in &finished {
            usage.accumulate(task.usage);
        }
        info!(
            completed,
            tokens = usage.total_tokens,
            failed = finished.iter().filter(|t| t.state == AgentState::Failed).count(),
            timed_out = finished.iter().filter(|t| t.state == AgentState::TimedOut).count(),
            elapsed_ms = %start.elapsed().as_millis(),
            "execute phase finished"
        );

        if completed == 0 {
            tracker.set_phase(Phase::Failed);
            return Err(OrchestrationError::AllAgentsFailed {
                failures: finished.iter().map(AgentTask::failure_summary).collect(),
            });
        }

        // Synthesize
        tracker.set_phase(Phase::Synthesizing);
        let input = SynthesisInput::from_tasks(&req.query, &finished);
        let result = self.synthesize(&input, tier, &call).await;
        let Some(result) = result else {
            tracker.set_phase(Phase::Failed);
            return Err(OrchestrationError::AllAgentsFailed {
                failures: finished.iter().map(AgentTask::failure_summary).collect(),
            });
        };

        tracker.set_phase(Phase::Done);
        info!(
            degraded = result.degraded,
            contributing = result.contributing_agents.len(),
            elapsed_ms = %start.elapsed().as_millis(),
            "orchestration finished"
        );
        Ok(result)
    }

    async fn decompose(
        &self,
        query: &str,
        tier: ModelTier,
        n: usize,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let generator = QuestionGenerator::new(QuestionAgent::new(
            self.config.question_max_tokens,
            self.prompts.decompose.clone(),
        ));
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!("call cancelled or timed out during decomposition, using templated sub-questions");
                fallback_questions(query, n)
            }
            questions = generator.generate(&self.client, tier, query, n) => questions,
        }
    }

    /// Spawns one worker per task and waits for all of them.
    ///
    /// Returns the tasks in index order, every one of them terminal.
    async fn fan_out(
        &self,
        query: &str,
        tasks: Vec<AgentTask>,
        limits: WorkerLimits,
        tracker: &ProgressTracker,
        call: &CancellationToken,
    ) -> Vec<AgentTask> {
        let (reporter, pump) = tracker.listen();
        let worker = AgentWorker::new(
            Arc::clone(&self.client),
            Arc::clone(&self.bridge),
            Arc::new(ResearchAgent::new(
                self.config.worker_max_tokens,
                self.prompts.worker.clone(),
            )),
            limits,
            reporter,
        );
        let query: Arc<str> = Arc::from(query);

        let handles: Vec<_> = tasks
            .iter()
            .map(|task| {
                tokio::spawn(worker.clone().run(task.clone(), Arc::clone(&query), call.clone()))
            })
            .collect();
        // the pump stops once the last worker drops its reporter
        drop(worker);

        let mut finished = Vec::with_capacity(tasks.len());
        for (mut task, handle) in tasks.into_iter().zip(handles) {
            match handle.await {
                Ok(done) => finished.push(done),
                Err(e) => {
                    warn!(agent = task.index, error = %e, "agent task died");
                    task.fail(ErrorKind::Internal {
                        message: e.to_string(),
                    });
                    finished.push(task);
                }
            }
        }

        if let Err(e) = pump.await {
            warn!(error = %e, "progress listener stopped abnormally");
        }

        let tracked = tracker.snapshot();
        for task in &mut finished {
            if !task.state.is_terminal() {
                debug!(agent = task.index, state = %task.state, "forcing timeout on unfinished agent");
                task.time_out(TimeoutScope::Call);
            }
            let in_sync = tracked
                .tasks
                .iter()
                .any(|t| t.id == task.id && t.state == task.state);
            if !in_sync {
                tracker.update(task.clone());
            }
        }

        finished
    }

    /// Synthesis with the longest-result fallback.
    ///
    /// Returns `None` only if no entry carries a result.
    async fn synthesize(
        &self,
        input: &SynthesisInput,
        tier: ModelTier,
        cancel: &CancellationToken,
    ) -> Option<SynthesisResult> {
        let engine = SynthesisEngine::new(SynthesizerAgent::new(
            self.config.synthesizer_max_tokens,
            self.prompts.synthesizer.clone(),
        ));
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AgentError::Cancelled),
            result = engine.synthesize(&self.client, tier, input) => result,
        };
        match outcome {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, "synthesis failed");
                longest_result(input)
            }
        }
    }
}

/// Cancels `call` once `overall_timeout` elapses, unless it is cancelled
/// first.
fn arm_overall_timeout(call: CancellationToken, overall_timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            () = call.cancelled() => {}
            () = tokio::time::sleep(overall_timeout) => {
                warn!(after_ms = %overall_timeout.as_millis(), "overall timeout, cancelling the call");
                call.cancel();
            }
        }
    });
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("client", &self.client)
            .field("tools", &self.bridge.definitions().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
