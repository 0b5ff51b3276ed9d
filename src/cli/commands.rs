//! CLI command implementations.
//!
//! Each command is synchronous at the boundary and builds its own tokio
//! runtime when it needs one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent::bridge::ToolBridge;
use crate::agent::client::{InferenceClient, ModelTier};
use crate::agent::config::{HeavyConfig, HeavyConfigBuilder};
use crate::agent::orchestrator::Orchestrator;
use crate::agent::progress::ProgressTracker;
use crate::agent::prompt::PromptSet;
use crate::agent::task::OrchestrationRequest;
use crate::cli::output::{OutputFormat, format_result, format_tools, progress_line};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};

/// Parameters for the query command.
#[derive(Debug, Clone, Default)]
pub struct QueryCommandParams<'a> {
    /// The query to investigate.
    pub query: &'a str,
    /// Number of agents.
    pub agents: Option<usize>,
    /// Whole-call timeout in seconds.
    pub timeout: Option<u64>,
    /// Per-agent timeout in seconds.
    pub agent_timeout: Option<u64>,
    /// Model-call ceiling per agent.
    pub max_steps: Option<usize>,
    /// Start agents on the fallback model.
    pub fallback: bool,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
    /// JSON manifest of remote HTTP tools.
    pub tools_file: Option<&'a Path>,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute. Orchestration failures
/// surface as [`CommandError::Orchestration`].
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Query {
            query,
            agents,
            timeout,
            agent_timeout,
            max_steps,
            fallback,
            prompt_dir,
            tools_file,
        } => {
            let params = QueryCommandParams {
                query,
                agents: *agents,
                timeout: *timeout,
                agent_timeout: *agent_timeout,
                max_steps: *max_steps,
                fallback: *fallback,
                prompt_dir: prompt_dir.as_deref(),
                tools_file: tools_file.as_deref(),
            };
            cmd_query(&params, format)
        }
        #[cfg(feature = "server")]
        Commands::Serve {
            host,
            port,
            prompt_dir,
            tools_file,
        } => cmd_serve(host, *port, prompt_dir.as_deref(), tools_file.as_deref()),
        Commands::Tools { tools_file } => cmd_tools(tools_file.as_deref(), format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Environment-backed builder with the shared path overrides applied.
fn config_builder(prompt_dir: Option<&Path>, tools_file: Option<&Path>) -> HeavyConfigBuilder {
    let mut builder = HeavyConfig::builder().from_env();
    if let Some(dir) = prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(path) = tools_file {
        builder = builder.tools_file(path);
    }
    builder
}

fn build_config(builder: HeavyConfigBuilder) -> Result<HeavyConfig> {
    builder
        .build()
        .map_err(|e| CommandError::ExecutionFailed(format!("Configuration error: {e}")))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })
}

/// Builds the client and tool bridge for `config`.
fn wire(config: &HeavyConfig) -> Result<(Arc<InferenceClient>, Arc<ToolBridge>)> {
    let client = InferenceClient::from_config(config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let bridge = ToolBridge::with_defaults(config.tools_file.as_deref())?;
    Ok((Arc::new(client), Arc::new(bridge)))
}

// ==================== Query Command ====================

fn cmd_query(params: &QueryCommandParams<'_>, format: OutputFormat) -> Result<String> {
    let mut builder = config_builder(params.prompt_dir, params.tools_file);
    if let Some(n) = params.max_steps {
        builder = builder.max_steps(n);
    }
    let config = build_config(builder)?;

    let mut req = OrchestrationRequest::new(params.query);
    req.agent_count = params.agents;
    req.overall_timeout = params.timeout.map(Duration::from_secs);
    req.per_agent_timeout = params.agent_timeout.map(Duration::from_secs);
    if params.fallback {
        req.model_preference = ModelTier::Fallback;
    }
    // reject before touching the network
    req.validate(config.max_agents)?;

    let (client, bridge) = wire(&config)?;
    let rt = runtime()?;

    let start = Instant::now();
    let outcome = rt.block_on(async {
        if req.model_preference == ModelTier::Primary {
            client.probe().await;
        }
        let orchestrator = Orchestrator::new(client, bridge, config);

        let tracker = ProgressTracker::new();
        let logger = tokio::spawn(log_progress(tracker.clone()));

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        let signal = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling agents");
                on_signal.cancel();
            }
        });

        let outcome = orchestrator.execute_with(req, &tracker, cancel).await;
        signal.abort();
        logger.abort();
        outcome
    });

    let result = outcome?;
    Ok(format_result(&result, start.elapsed().as_secs_f64(), format))
}

/// Logs a line whenever the phase or the number of finished agents changes.
async fn log_progress(tracker: ProgressTracker) {
    let mut updates = Box::pin(tracker.subscribe());
    drop(tracker);
    let mut last = None;
    while let Some(snapshot) = updates.next().await {
        let key = (snapshot.phase, snapshot.terminal_count(), snapshot.tasks.len());
        if last != Some(key) {
            last = Some(key);
            info!("{}", progress_line(&snapshot));
        }
    }
}

// ==================== Serve Command ====================

#[cfg(feature = "server")]
fn cmd_serve(
    host: &str,
    port: u16,
    prompt_dir: Option<&Path>,
    tools_file: Option<&Path>,
) -> Result<String> {
    let config = build_config(config_builder(prompt_dir, tools_file))?;
    let (client, bridge) = wire(&config)?;
    let rt = runtime()?;

    rt.block_on(async {
        client.probe().await;
        let orchestrator = Arc::new(Orchestrator::new(client, bridge, config));
        crate::server::serve(orchestrator, host, port).await
    })
    .map_err(|e| CommandError::ExecutionFailed(format!("Server error: {e}")))?;

    Ok(String::new())
}

// ==================== Tools Command ====================

fn cmd_tools(tools_file: Option<&Path>, format: OutputFormat) -> Result<String> {
    let bridge = ToolBridge::with_defaults(tools_file)?;
    Ok(format_tools(bridge.definitions(), format))
}

// ==================== Init Prompts Command ====================

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown");
                output.push_str("  ");
                output.push_str(name);
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize the agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
