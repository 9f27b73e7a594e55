//! Storage Layer
//!
//! Handles all data persistence: stage artifacts (filesystem, SQLite or
//! memory) and the TOML configuration file.

pub mod artifact_store;
pub mod config;
pub mod fs_store;
pub mod sqlite_store;

use std::path::PathBuf;
use std::sync::Arc;

pub use artifact_store::{validate_run_id, ArtifactStore, InMemoryArtifactStore};
pub use config::load_config;
pub use fs_store::FsArtifactStore;
pub use sqlite_store::SqliteArtifactStore;

use crate::models::settings::{StorageBackend, StorageSettings};
use crate::utils::error::AppResult;
use crate::utils::paths::runs_dir;

/// SQLite database file name inside the output directory
pub const DATABASE_FILE: &str = "panelsim.db";

/// Resolve the configured output directory, defaulting to `~/.panelsim/runs`
pub fn output_dir(settings: &StorageSettings) -> AppResult<PathBuf> {
    match &settings.output_dir {
        Some(dir) => Ok(dir.clone()),
        None => runs_dir(),
    }
}

/// Open the artifact store selected by `settings`
pub fn open_store(settings: &StorageSettings) -> AppResult<Arc<dyn ArtifactStore>> {
    let dir = output_dir(settings)?;
    let store: Arc<dyn ArtifactStore> = match settings.backend {
        StorageBackend::Fs => Arc::new(FsArtifactStore::new(dir)),
        StorageBackend::Sqlite => Arc::new(SqliteArtifactStore::open(&dir.join(DATABASE_FILE))?),
    };
    tracing::debug!(backend = store.name(), "Artifact store opened");
    Ok(store)
}
