//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// heavy-rs: decompose a query, research it with concurrent agents, and
/// synthesize one answer.
#[derive(Parser, Debug)]
#[command(name = "heavy-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one orchestration and print the synthesized answer.
    ///
    /// Splits the query into sub-questions, investigates each with a
    /// concurrent agent, and merges the results. Requires an
    /// OpenAI-compatible API key.
    #[command(after_help = r#"Examples:
  heavy-rs query "Compare solar vs wind energy costs"
  heavy-rs query "Compare solar vs wind energy costs" --agents 3
  heavy-rs query "What drives lithium prices?" --timeout 120 --agent-timeout 60
  heavy-rs query "Summarize recent fusion results" --fallback --max-steps 5
  heavy-rs --format json query "energy storage outlook" | jq .finalAnswer
  OPENAI_API_KEY=sk-... heavy-rs query "explain grid inertia" --tools-file tools.json
"#)]
    Query {
        /// The query to investigate.
        query: String,

        /// Number of agents. When omitted, the configured default or a
        /// count derived from the query is used.
        #[arg(short = 'n', long)]
        agents: Option<usize>,

        /// Whole-call timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Per-agent timeout in seconds.
        #[arg(long)]
        agent_timeout: Option<u64>,

        /// Model-call ceiling per agent.
        #[arg(long)]
        max_steps: Option<usize>,

        /// Start every agent on the fallback model.
        #[arg(long)]
        fallback: bool,

        /// Directory containing prompt template files.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,

        /// JSON manifest of remote HTTP tools.
        #[arg(long)]
        tools_file: Option<PathBuf>,
    },

    /// Start the HTTP orchestration API.
    #[cfg(feature = "server")]
    #[command(after_help = r#"Examples:
  heavy-rs serve                             # Listen on 127.0.0.1:8080
  heavy-rs serve --host 0.0.0.0 --port 9000
"#)]
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Directory containing prompt template files.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,

        /// JSON manifest of remote HTTP tools.
        #[arg(long)]
        tools_file: Option<PathBuf>,
    },

    /// List the tools agents can call.
    #[command(after_help = r#"Examples:
  heavy-rs tools
  heavy-rs tools --tools-file tools.json
  heavy-rs --format json tools | jq '.[].name'
"#)]
    Tools {
        /// JSON manifest of remote HTTP tools.
        #[arg(long, env = "HEAVY_TOOLS_FILE")]
        tools_file: Option<PathBuf>,
    },

    /// Write default prompt templates to disk for customization.
    ///
    /// Existing files are left untouched.
    #[command(name = "init-prompts")]
    #[command(after_help = r#"Examples:
  heavy-rs init-prompts                      # Write to ~/.config/heavy-rs/prompts/
  heavy-rs init-prompts --dir ./my-prompts   # Write to custom directory
"#)]
    InitPrompts {
        /// Target directory for prompt templates.
        ///
        /// Defaults to `~/.config/heavy-rs/prompts/`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}
