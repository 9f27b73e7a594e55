//! Simulation Variants
//!
//! The six stages are the same for every simulation kind. Design,
//! collection and processing differ per kind and live behind
//! `SimulationVariant`; entity generation, analysis and reporting are shared
//! (see `stages`).

use async_trait::async_trait;
use panelsim_core::SimulationKind;

use super::artifacts::{CollectionArtifact, DesignArtifact, PopulationArtifact, ProcessedArtifact};
use super::context::StageContext;
use super::conversation::{FocusGroupVariant, InterviewVariant};
use super::survey::SurveyVariant;
use crate::utils::error::AppResult;

#[async_trait]
pub trait SimulationVariant: Send + Sync {
    fn kind(&self) -> SimulationKind;

    /// Prefix of generated entity ids (`R001`, `P001`, ...)
    fn entity_prefix(&self) -> &'static str;

    async fn design(&self, ctx: &StageContext) -> AppResult<DesignArtifact>;

    async fn collect(
        &self,
        ctx: &StageContext,
        population: PopulationArtifact,
    ) -> AppResult<CollectionArtifact>;

    /// Deterministic; never calls the generation backend.
    fn process(&self, ctx: &StageContext, collection: CollectionArtifact) -> AppResult<ProcessedArtifact>;
}

pub fn variant_for(kind: SimulationKind) -> Box<dyn SimulationVariant> {
    match kind {
        SimulationKind::Survey => Box::new(SurveyVariant),
        SimulationKind::FocusGroup => Box::new(FocusGroupVariant),
        SimulationKind::Interview => Box::new(InterviewVariant),
    }
}
