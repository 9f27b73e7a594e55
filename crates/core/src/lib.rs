//! Panelsim Core
//!
//! Foundational data model, error types, role specifications and pipeline
//! events shared by every crate in the panelsim workspace. This crate has no
//! dependency on any other workspace crate.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `model` - Run, stage, entity profile, interaction record and analysis artifact types
//! - `role` - `RoleKind` / `RoleSpec` for the generation backend
//! - `events` - `PipelineEvent` and the explicit `EventSink` telemetry channel

pub mod error;
pub mod events;
pub mod model;
pub mod role;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Pipeline Events ────────────────────────────────────────────────────
pub use events::{EventSink, PipelineEvent};

// ── Data Model ─────────────────────────────────────────────────────────
pub use model::{
    AnalysisArtifact, EntityProfile, InteractionRecord, Run, RunParameters, RunStatus,
    SimulationKind, StageName, StageRecord, StageStatus, Turn,
};

// ── Roles ──────────────────────────────────────────────────────────────
pub use role::{InteractorRole, RoleKind, RoleSpec};
