//! Simulation Pipeline
//!
//! - `controller` - `PipelineController`, the six-stage sequencer
//! - `context` - run-scoped collaborators handed to every stage
//! - `fanout` - bounded, order-preserving concurrent executor
//! - `variant` - per-kind design/collect/process (`survey`, `conversation`)
//! - `stages` - entity generation, analysis and report shared by all kinds
//! - `artifacts` - typed stage artifacts
//! - `schemas` / `prompts` - structured-output schemas, fallback seeds, prompt text
//! - `report` - Markdown rendering

pub mod artifacts;
pub mod context;
pub mod controller;
pub mod conversation;
pub mod fanout;
pub mod prompts;
pub mod report;
pub mod schemas;
pub mod stages;
pub mod survey;
pub mod variant;

pub use artifacts::{
    AnalyzedArtifact, CollectionArtifact, DesignArtifact, PopulationArtifact, ProcessedArtifact,
    ReportArtifact, StageArtifact,
};
pub use context::StageContext;
pub use controller::{PipelineController, RunResult};
pub use fanout::{collect_results, FanOutExecutor};
pub use variant::{variant_for, SimulationVariant};
