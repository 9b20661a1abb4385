//! `strata init`: write the default config file.

use strata_config::AppConfig;

use super::CliResult;

pub fn run(force: bool) -> CliResult {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");
    if path.exists() && !force {
        println!("Config already exists at {} (use --force to overwrite)", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote {}", path.display());
    println!("Set GEMINI_API_KEY or add api_key to the file before chatting.");
    Ok(())
}
