//! `strata apply`: execute a tool payload from a file.
//!
//! The file may hold a bare `{"actions": [...]}` object or model text with
//! an embedded tool block.

use std::path::{Path, PathBuf};

use strata_core::{ActionStatus, OutputStream};
use strata_security::RoleAccessFilter;
use strata_tools::{ActionExecutor, extract, parse_payload};

use super::{CliResult, load_config, model_client, print_results, spawn_printer};

pub async fn run(workspace: Option<PathBuf>, file: &Path, persona: Option<String>) -> CliResult {
    let config = load_config()?;
    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;

    let actions = if text.trim_start().starts_with('{') {
        parse_payload(&text).map_err(|e| format!("Invalid tool payload: {e}"))?
    } else {
        extract(&text).actions
    };
    if actions.is_empty() {
        println!("No actions found in {}", file.display());
        return Ok(());
    }

    let persona = persona.or_else(|| config.session.default_persona.clone());
    let outcome = RoleAccessFilter::default().filter(actions, persona.as_deref());
    for blocked in &outcome.blocked {
        println!("  [blocked] {}: {}", blocked.action.describe(), blocked.reason);
    }

    let output = OutputStream::default();
    let _printer = spawn_printer(&output);
    let mut executor = ActionExecutor::new(&config, workspace.clone(), output);
    // Image generation is the only action that needs the model service.
    if let Ok(model) = model_client(&config, workspace.as_deref()) {
        executor = executor.with_image_client(model);
    }

    let results = executor.execute_all(&outcome.allowed).await;
    println!();
    print_results(&results);

    let failed = results
        .iter()
        .filter(|r| r.status == ActionStatus::Failed)
        .count();
    println!(
        "\n  {} applied, {} failed, {} blocked",
        results.len() - failed,
        failed,
        outcome.blocked.len()
    );
    Ok(())
}
