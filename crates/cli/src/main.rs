//! Strata CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Talk to the agent (single message or interactive)
//! - `apply`: Execute a tool payload from a file
//! - `context`: Print the workspace snapshot the model sees
//! - `personas`: List personas and their allowed tools
//! - `status`: Show configuration and host status
//! - `init`: Write a default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata — an AI coding agent for your workspace",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace root (defaults to the current directory)
    #[arg(short, long, global = true, env = "STRATA_WORKSPACE")]
    workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Persona to speak as (restricts tools)
        #[arg(short, long)]
        persona: Option<String>,

        /// Execute proposed actions without asking
        #[arg(short, long)]
        auto_apply: bool,

        /// Turn limit when auto-continuing after applied actions
        #[arg(long, default_value_t = 5)]
        max_turns: u32,
    },

    /// Execute the actions in a tool payload file
    Apply {
        /// File holding `{"actions": [...]}` or text with a tool block
        file: PathBuf,

        /// Persona whose allowlist filters the actions
        #[arg(short, long)]
        persona: Option<String>,
    },

    /// Print the workspace context snapshot
    Context,

    /// List built-in personas
    Personas,

    /// Show configuration and host status
    Status,

    /// Write a default config file to ~/.strata/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let workspace = commands::resolve_workspace(cli.workspace);

    match cli.command {
        Commands::Chat {
            message,
            persona,
            auto_apply,
            max_turns,
        } => {
            commands::chat::run(commands::chat::ChatOptions {
                workspace,
                message,
                persona,
                auto_apply,
                max_turns,
            })
            .await?
        }
        Commands::Apply { file, persona } => {
            commands::apply::run(workspace, &file, persona).await?
        }
        Commands::Context => commands::context::run(workspace).await?,
        Commands::Personas => commands::personas::run(),
        Commands::Status => commands::status::run(workspace)?,
        Commands::Init { force } => commands::init::run(force)?,
    }

    Ok(())
}
