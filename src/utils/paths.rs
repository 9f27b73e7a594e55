//! Cross-Platform Path Utilities
//!
//! Functions for resolving the panelsim directories (~/.panelsim/ and below).

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the panelsim directory (~/.panelsim/)
pub fn panelsim_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".panelsim"))
}

/// Get the default config file path (~/.panelsim/config.toml)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(panelsim_dir()?.join("config.toml"))
}

/// Get the default artifact directory (~/.panelsim/runs/)
pub fn runs_dir() -> AppResult<PathBuf> {
    Ok(panelsim_dir()?.join("runs"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
