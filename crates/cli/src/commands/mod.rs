//! Subcommand implementations and the plumbing they share.

pub mod apply;
pub mod chat;
pub mod context;
pub mod init;
pub mod personas;
pub mod status;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use strata_agent::Session;
use strata_config::AppConfig;
use strata_core::{ActionResult, ModelClient, OutputEvent, OutputStream};
use strata_providers::{GeminiClient, RetryPolicy, RetryingClient};
use strata_tools::ActionExecutor;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn resolve_workspace(arg: Option<PathBuf>) -> Option<PathBuf> {
    arg.or_else(|| std::env::current_dir().ok())
}

pub fn load_config() -> CliResult<AppConfig> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// The model client with the configured retry policy, or an error naming
/// where the credential can be set.
pub fn model_client(config: &AppConfig, workspace: Option<&std::path::Path>) -> CliResult<Arc<dyn ModelClient>> {
    let key = config.resolve_api_key(workspace).map_err(|e| {
        format!(
            "{e}\n  Set GEMINI_API_KEY, add it to the workspace .env, or set api_key in {}",
            AppConfig::config_dir().join("config.toml").display()
        )
    })?;
    let client = GeminiClient::from_config(&config.model, key);
    Ok(Arc::new(RetryingClient::new(
        client,
        RetryPolicy::from_config(&config.retry),
    )))
}

pub fn build_session(
    config: &AppConfig,
    workspace: Option<PathBuf>,
    output: OutputStream,
    persona: Option<String>,
) -> CliResult<Session> {
    let model = model_client(config, workspace.as_deref())?;
    let executor =
        ActionExecutor::new(config, workspace, output).with_image_client(Arc::clone(&model));
    let mut session = Session::new(config, model, executor);
    if persona.is_some() {
        session.set_persona(persona);
    }
    Ok(session)
}

/// Print live output events until the stream closes.
pub fn spawn_printer(output: &OutputStream) -> JoinHandle<()> {
    let mut rx = output.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => eprintln!("  [output] {n} events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &OutputEvent) {
    match event {
        OutputEvent::Command { command, cwd } => println!("\n  $ {command}    ({cwd})"),
        OutputEvent::Output(chunk) => {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        }
        OutputEvent::Exited { code } => println!("  [exit {code}]"),
        OutputEvent::Backgrounded { command } => {
            println!("  [still running in background] {command}")
        }
        OutputEvent::Notice(text) => println!("  [strata] {text}"),
        OutputEvent::OpenFile { path } => println!("  [open] {path}"),
    }
}

pub fn print_results(results: &[ActionResult]) {
    for result in results {
        match &result.message {
            Some(message) => println!(
                "  [{}] {}: {message}",
                result.status,
                result.action.describe()
            ),
            None => println!("  [{}] {}", result.status, result.action.describe()),
        }
    }
}
