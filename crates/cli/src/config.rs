//! Configuration management for the CLI

use anyhow::{Context, Result};
use insight_lib::EngineConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve the engine configuration file
///
/// An explicit path must exist. Without one, `~/.config/pinsight/config.toml`
/// is used when present; otherwise only defaults and the environment apply.
pub fn resolve_config_path(override_path: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let default = default_config_path()?;
    Ok(default.exists().then_some(default))
}

/// Load the engine configuration used by every command
pub fn load_engine_config(override_path: Option<&Path>) -> Result<EngineConfig> {
    let path = resolve_config_path(override_path)?;
    debug!(
        event = "config_resolved",
        path = ?path.as_ref().map(|p| p.display().to_string()),
        "Resolved engine configuration"
    );
    EngineConfig::load(path.as_deref()).context("Failed to load engine configuration")
}

/// Get the default configuration file path
fn default_config_path() -> Result<PathBuf> {
    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("pinsight").join("config.toml"))
}
