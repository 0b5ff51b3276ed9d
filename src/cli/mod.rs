//! CLI layer for heavy-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! running orchestrations, serving the HTTP API, and managing prompts and
//! tools.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
