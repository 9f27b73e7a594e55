//! Panelsim
//!
//! Orchestration layer for simulated market research: a staged pipeline that
//! turns many unreliable text-generation calls into a complete, analyzable
//! artifact set.
//! It includes:
//! - The stage pipeline controller and fan-out executor
//! - Survey, focus group and interview variants
//! - Storage layer (filesystem, SQLite, in-memory artifact stores; TOML config)
//! - Configuration models and utilities

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::{PanelsimConfig, StorageBackend};
pub use services::pipeline::{PipelineController, RunResult, StageContext};
pub use storage::{
    load_config, open_store, ArtifactStore, FsArtifactStore, InMemoryArtifactStore,
    SqliteArtifactStore,
};
pub use utils::error::{AppError, AppResult};
