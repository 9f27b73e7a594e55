//! TOML Configuration Loading
//!
//! Reads `config.toml` (explicit path or `~/.panelsim/config.toml`), applies
//! environment overrides and validates the result.

use std::fs;
use std::path::Path;

use crate::models::settings::PanelsimConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::config_path;

/// Load configuration from a file
pub fn load_from_file(path: &Path) -> AppResult<PanelsimConfig> {
    let content = fs::read_to_string(path)?;
    let mut config: PanelsimConfig = toml::from_str(&content)?;
    config.apply_env();
    config.validate().map_err(AppError::config)?;
    Ok(config)
}

/// Load the configuration for a CLI invocation.
///
/// An explicit `path` must exist. Without one, the default location is used
/// when present and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> AppResult<PanelsimConfig> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(AppError::not_found(format!(
                "Config file {}",
                path.display()
            )));
        }
        return load_from_file(path);
    }

    let default_path = config_path()?;
    if default_path.exists() {
        tracing::debug!(path = %default_path.display(), "Loading default config");
        return load_from_file(&default_path);
    }

    let mut config = PanelsimConfig::default();
    config.apply_env();
    config.validate().map_err(AppError::config)?;
    Ok(config)
}
