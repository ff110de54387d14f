use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// An OpenAI- and Anthropic-compatible gateway for mixed upstream providers.
#[derive(Debug, Parser)]
#[command(name = "modelgate", version, about)]
pub struct Args {
    /// Log filter directives, e.g. "info" or "gateway=debug,server=debug".
    #[arg(long, env = "MODELGATE_LOG", default_value = "info", global = true)]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP gateway.
    Serve {
        /// Path to the YAML configuration file.
        #[arg(long)]
        config: PathBuf,

        /// Override the server port from configuration. The override sticks
        /// across hot reloads.
        #[arg(long)]
        port: Option<u16>,
    },
}
