//! `strata status`: configuration and host status.

use std::path::PathBuf;
use strata_config::AppConfig;
use strata_tools::ProcessRegistry;
use strata_tools::system::SystemStatus;

use super::{CliResult, load_config};

pub fn run(workspace: Option<PathBuf>) -> CliResult {
    let config = load_config()?;
    let credential = match config.resolve_api_key(workspace.as_deref()) {
        Ok(_) => "found",
        Err(_) => "missing",
    };

    println!("Strata Status");
    println!("=============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!(
        "  Workspace:    {}",
        workspace
            .as_deref()
            .map_or_else(|| "(none)".to_string(), |p| p.display().to_string())
    );
    println!("  Model:        {}", config.model.name);
    println!("  Image model:  {}", config.model.image_model());
    println!("  API key:      {credential}");
    println!(
        "  Retries:      {} (base {} ms, jitter {} ms)",
        config.retry.max_retries, config.retry.base_delay_ms, config.retry.jitter_ms
    );
    println!(
        "  Persona:      {}",
        config.session.default_persona.as_deref().unwrap_or("(none)")
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file; run `strata init` to create one");
    }

    let host = SystemStatus::collect(workspace.as_deref(), &ProcessRegistry::new());
    println!("\nHost:\n{}", host.to_pretty_json());
    Ok(())
}
