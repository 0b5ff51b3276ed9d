//! Scripted inference and tool backends for integration tests.
//!
//! The provider tells the three roles apart by a marker in the system
//! prompt and answers each worker according to its sub-question.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use heavy_rs::agent::{
    ChatRequest, ChatResponse, Endpoint, HeavyConfig, HeavyConfigBuilder, InferenceClient,
    LlmProvider, Orchestrator, PromptSet, Role, ToolBridge, ToolCall, ToolDefinition, ToolProvider,
};
use heavy_rs::error::{AgentError, ToolError, ToolErrorKind};

pub const DECOMPOSE: &str = "ROLE:decompose";
pub const WORKER: &str = "ROLE:worker";
pub const SYNTHESIZE: &str = "ROLE:synthesize";

pub const PRIMARY_MODEL: &str = "big";
pub const FALLBACK_MODEL: &str = "small";

/// How a worker answers.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Final answer on the first step.
    Answer(String),
    /// Every call fails.
    Fail,
    /// Never returns.
    Hang,
    /// Requests these tools on the first step, then answers.
    ToolsThen(Vec<&'static str>, String),
    /// Requests these tools on every step.
    AlwaysTools(Vec<&'static str>),
}

/// Which pipeline stage a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Decompose,
    Worker,
    Synthesize,
}

/// One observed request.
#[derive(Debug, Clone)]
pub struct Seen {
    pub stage: Stage,
    pub model: String,
    pub user: String,
}

pub struct Script {
    /// Decomposition reply; `None` fails the call.
    pub decompose: Option<String>,
    pub workers: HashMap<String, Reply>,
    pub default_worker: Reply,
    /// Synthesis reply; `None` fails the call.
    pub synthesis: Option<String>,
    /// Decompose or synthesize requests that never return.
    pub hanging: Vec<Stage>,
    pub healthy: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            decompose: None,
            workers: HashMap::new(),
            default_worker: Reply::Answer("finding".to_string()),
            synthesis: Some("merged answer".to_string()),
            hanging: Vec::new(),
            healthy: true,
        }
    }
}

impl Script {
    pub fn questions(mut self, questions: &[&str]) -> Self {
        self.decompose = Some(json!({ "questions": questions }).to_string());
        self
    }

    pub fn worker(mut self, sub_question: &str, reply: Reply) -> Self {
        self.workers.insert(sub_question.to_string(), reply);
        self
    }

    pub fn default_worker(mut self, reply: Reply) -> Self {
        self.default_worker = reply;
        self
    }

    pub fn synthesis(mut self, reply: Option<&str>) -> Self {
        self.synthesis = reply.map(str::to_string);
        self
    }

    pub fn hang(mut self, stage: Stage) -> Self {
        self.hanging.push(stage);
        self
    }

    pub const fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }
}

pub struct ScriptedProvider {
    script: Script,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn calls(&self, stage: Stage) -> usize {
        self.seen().iter().filter(|s| s.stage == stage).count()
    }

    /// Worker calls made for one sub-question.
    pub fn worker_calls(&self, sub_question: &str) -> usize {
        self.seen()
            .iter()
            .filter(|s| s.stage == Stage::Worker && sub_question_of(&s.user) == sub_question)
            .count()
    }
}

fn sub_question_of(user: &str) -> &str {
    user.split_once("<sub_question>")
        .and_then(|(_, rest)| rest.split_once("</sub_question>"))
        .map_or("", |(q, _)| q)
}

fn stage_of(request: &ChatRequest) -> Stage {
    let system = request
        .messages
        .first()
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    if system.contains(DECOMPOSE) {
        Stage::Decompose
    } else if system.contains(SYNTHESIZE) {
        Stage::Synthesize
    } else {
        Stage::Worker
    }
}

fn failure() -> AgentError {
    AgentError::ApiRequest {
        message: "scripted failure".to_string(),
        status: Some(500),
    }
}

fn text(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.to_string(),
        finish_reason: Some("stop".to_string()),
        ..ChatResponse::default()
    }
}

fn tool_calls(names: &[&'static str], step: usize) -> ChatResponse {
    ChatResponse {
        tool_calls: names
            .iter()
            .enumerate()
            .map(|(i, name)| ToolCall {
                id: format!("call_{step}_{i}"),
                name: (*name).to_string(),
                arguments: "{}".to_string(),
            })
            .collect(),
        finish_reason: Some("tool_calls".to_string()),
        ..ChatResponse::default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let stage = stage_of(request);
        let user = request
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(Seen {
                stage,
                model: model.to_string(),
                user: user.clone(),
            });
        }

        if self.script.hanging.contains(&stage) {
            return std::future::pending().await;
        }

        match stage {
            Stage::Decompose => self.script.decompose.as_deref().map(text).ok_or_else(failure),
            Stage::Synthesize => self.script.synthesis.as_deref().map(text).ok_or_else(failure),
            Stage::Worker => {
                let reply = self
                    .script
                    .workers
                    .get(sub_question_of(&user))
                    .unwrap_or(&self.script.default_worker);
                let step = request
                    .messages
                    .iter()
                    .filter(|m| m.role == Role::Assistant)
                    .count();
                match reply {
                    Reply::Answer(answer) => Ok(text(answer)),
                    Reply::Fail => Err(failure()),
                    Reply::Hang => std::future::pending().await,
                    Reply::ToolsThen(names, answer) => {
                        if step == 0 {
                            Ok(tool_calls(names, step))
                        } else {
                            Ok(text(answer))
                        }
                    }
                    Reply::AlwaysTools(names) => Ok(tool_calls(names, step)),
                }
            }
        }
    }

    async fn health_check(&self) -> Result<(), AgentError> {
        if self.script.healthy {
            Ok(())
        } else {
            Err(failure())
        }
    }
}

/// Tools `alpha` and `beta` answering `{"ok": true}`; `offline` is unavailable.
#[derive(Default)]
pub struct RecordingTools {
    calls: Mutex<Vec<String>>,
    count: AtomicUsize,
}

impl RecordingTools {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolProvider for RecordingTools {
    fn name(&self) -> &str {
        "recording"
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        ["alpha", "beta", "offline"]
            .into_iter()
            .map(|name| ToolDefinition {
                name: name.to_string(),
                description: format!("test tool {name}"),
                parameters: json!({ "type": "object", "properties": {} }),
            })
            .collect()
    }

    async fn invoke(&self, tool: &str, _params: &Map<String, Value>) -> Result<Value, ToolError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(tool.to_string());
        }
        if tool == "offline" {
            return Err(ToolError::new(tool, ToolErrorKind::Unavailable, "connection refused"));
        }
        Ok(json!({ "ok": true }))
    }
}

pub fn prompts() -> PromptSet {
    PromptSet {
        decompose: DECOMPOSE.to_string(),
        worker: WORKER.to_string(),
        synthesizer: SYNTHESIZE.to_string(),
    }
}

/// Builder with generous timeouts; tests tighten what they exercise.
pub fn config() -> HeavyConfigBuilder {
    HeavyConfig::builder()
        .api_key("test")
        .max_agents(8)
        .per_agent_timeout(Duration::from_secs(10))
        .overall_timeout(Duration::from_secs(20))
        .request_timeout(Duration::from_secs(10))
        .tool_timeout(Duration::from_secs(2))
        .max_steps(5)
}

pub fn client(provider: &Arc<ScriptedProvider>, request_timeout: Duration) -> Arc<InferenceClient> {
    Arc::new(InferenceClient::new(
        Endpoint::new(provider.clone(), PRIMARY_MODEL),
        Endpoint::new(provider.clone(), FALLBACK_MODEL),
        request_timeout,
    ))
}

pub fn orchestrator(
    provider: &Arc<ScriptedProvider>,
    tools: Option<Arc<RecordingTools>>,
    config: HeavyConfigBuilder,
) -> Orchestrator {
    let config = config.build().unwrap_or_else(|e| unreachable!("{e}"));
    let mut bridge = ToolBridge::new();
    if let Some(tools) = tools {
        bridge.register(tools).unwrap_or_else(|e| unreachable!("{e}"));
    }
    Orchestrator::with_prompts(
        client(provider, config.request_timeout),
        Arc::new(bridge),
        config,
        prompts(),
    )
}
