//! # heavy-rs
//!
//! "Heavy Mode" orchestration: one open-ended query is decomposed into
//! several independent sub-investigations, each run concurrently by a
//! tool-using language-model agent, and the partial results are merged into
//! one synthesized answer.
//!
//! The call survives agent timeouts, tool outages and model failures: any
//! agent that completes contributes, and the result says whether it is
//! based on a subset (`degraded`).
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use heavy_rs::agent::{HeavyConfig, InferenceClient, Orchestrator, OrchestrationRequest, ToolBridge};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HeavyConfig::from_env()?;
//! let client = Arc::new(InferenceClient::from_config(&config)?);
//! let bridge = Arc::new(ToolBridge::with_defaults(config.tools_file.as_deref())?);
//! let orchestrator = Orchestrator::new(client, bridge, config);
//!
//! let req = OrchestrationRequest::new("Compare solar vs wind energy costs").with_agent_count(3);
//! let result = orchestrator.execute(req).await?;
//! println!("{}", result.final_answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`agent`]: orchestration core (question generation, workers, progress,
//!   synthesis, inference and tool adapters)
//! - [`server`]: HTTP orchestration API (feature `server`)
//! - [`cli`]: command-line front end
//! - [`error`]: error taxonomy

pub mod agent;
pub mod cli;
pub mod error;
#[cfg(feature = "server")]
pub mod server;

pub use agent::{
    HeavyConfig, InferenceClient, OrchestrationRequest, Orchestrator, ProgressSnapshot,
    ProgressTracker, SynthesisResult, ToolBridge,
};
pub use error::{AgentError, ErrorKind, OrchestrationError, ToolError};
