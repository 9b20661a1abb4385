//! `strata context`: print the snapshot that grounds each prompt.

use std::path::PathBuf;
use strata_agent::ContextCache;

use super::{CliResult, load_config};

pub async fn run(workspace: Option<PathBuf>) -> CliResult {
    let config = load_config()?;
    let cache = ContextCache::new(workspace.as_deref(), &config.context);
    let snapshot = cache.get().await;
    if snapshot.is_empty() {
        return Err("No workspace to snapshot".into());
    }
    print!("{}", snapshot.text);
    println!("\nSignals: {}", serde_json::to_string(&snapshot.signals)?);
    Ok(())
}
