//! Stage Pipeline Controller
//!
//! Runs the six stages strictly in order:
//! Design → Generate-Entities → Collect-Interactions → Process → Analyze → Report.
//!
//! Each stage receives only the previous stage's artifact and the run
//! context. An artifact is persisted before the next stage starts; when a
//! stage fails the run is marked failed (or cancelled), no further stage runs
//! and everything persisted so far stays readable.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use panelsim_core::{EventSink, PipelineEvent, Run, RunParameters, RunStatus, StageName};
use panelsim_llm::GenerationClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::artifacts::StageArtifact;
use super::context::StageContext;
use super::stages;
use super::variant::{variant_for, SimulationVariant};
use crate::models::PanelsimConfig;
use crate::storage::{validate_run_id, ArtifactStore};
use crate::utils::error::{AppError, AppResult};

/// Final state of a run
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run: Run,
    /// Rendered Markdown report, present when every stage succeeded
    pub report: Option<String>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.run.status == RunStatus::Succeeded
    }
}

pub struct PipelineController {
    store: Arc<dyn ArtifactStore>,
    client: Arc<dyn GenerationClient>,
    settings: PanelsimConfig,
    events: EventSink,
    cancel: CancellationToken,
}

impl PipelineController {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        client: Arc<dyn GenerationClient>,
        settings: PanelsimConfig,
    ) -> Self {
        Self {
            store,
            client,
            settings,
            events: EventSink::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Execute a run to completion.
    ///
    /// Stage failures do not surface as `Err`: they are recorded in the
    /// returned run. `Err` means the run could not be recorded at all
    /// (malformed run id, manifest write failure).
    pub async fn run(&self, run_id: &str, parameters: RunParameters) -> AppResult<RunResult> {
        validate_run_id(run_id)?;

        let mut run = Run::new(run_id, parameters.clone());
        run.mark_running();
        self.events
            .emit(PipelineEvent::RunStarted {
                run_id: run_id.to_string(),
            })
            .await;
        info!(run_id, kind = %parameters.kind, topic = %parameters.topic, "Run started");

        if let Err(e) = parameters.validate() {
            let message = AppError::from(e).to_string();
            error!(run_id, error = %message, "Invalid run parameters");
            return self.finish(run, RunStatus::Failed, Some(message), None).await;
        }
        self.store.write_manifest(&run).await?;

        let ctx = StageContext::new(
            run_id,
            parameters.clone(),
            self.client.clone(),
            &self.settings,
            self.events.clone(),
            self.cancel.clone(),
        );
        let variant = variant_for(parameters.kind);

        match self.execute(&mut run, &ctx, variant.as_ref()).await {
            Ok(report) => self.finish(run, RunStatus::Succeeded, None, Some(report)).await,
            Err(e) if e.is_cancelled() => {
                self.finish(run, RunStatus::Cancelled, Some(e.to_string()), None)
                    .await
            }
            Err(e) => self.finish(run, RunStatus::Failed, Some(e.to_string()), None).await,
        }
    }

    async fn execute(
        &self,
        run: &mut Run,
        ctx: &StageContext,
        variant: &dyn SimulationVariant,
    ) -> AppResult<String> {
        let design = self
            .stage(run, ctx, StageName::Design, variant.design(ctx))
            .await?;
        let population = self
            .stage(
                run,
                ctx,
                StageName::GenerateEntities,
                stages::generate_entities(ctx, variant.entity_prefix(), design),
            )
            .await?;
        let collection = self
            .stage(
                run,
                ctx,
                StageName::CollectInteractions,
                variant.collect(ctx, population),
            )
            .await?;
        let processed = self
            .stage(run, ctx, StageName::Process, async {
                variant.process(ctx, collection)
            })
            .await?;
        let analyzed = self
            .stage(run, ctx, StageName::Analyze, stages::analyze(ctx, processed))
            .await?;
        let report = self
            .stage(run, ctx, StageName::Report, async {
                stages::report(ctx, analyzed)
            })
            .await?;

        self.store.write_report(&run.id, &report.markdown).await?;
        Ok(report.markdown)
    }

    /// Run one stage and persist its artifact before returning it.
    async fn stage<A, F>(
        &self,
        run: &mut Run,
        ctx: &StageContext,
        stage: StageName,
        work: F,
    ) -> AppResult<A>
    where
        A: StageArtifact,
        F: Future<Output = AppResult<A>>,
    {
        ctx.check_cancelled()?;

        run.mark_stage_running(stage);
        self.store.write_manifest(run).await?;
        self.events
            .emit(PipelineEvent::StageStarted {
                run_id: run.id.clone(),
                stage,
            })
            .await;
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(AppError::Cancelled),
            result = work => result,
        };

        let persisted = match result {
            Ok(artifact) => self.persist(&run.id, stage, &artifact).await.map(|_| artifact),
            Err(e) => Err(e),
        };

        let artifact = match persisted {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(run_id = %run.id, stage = %stage, error = %e, "Stage failed");
                run.mark_stage_failed(stage, e.to_string());
                self.events
                    .emit(PipelineEvent::StageFailed {
                        run_id: run.id.clone(),
                        stage,
                        error: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };

        let degraded_items = artifact.degraded_items();
        run.mark_stage_succeeded(stage, degraded_items);
        self.store.write_manifest(run).await?;
        self.events
            .emit(PipelineEvent::StageCompleted {
                run_id: run.id.clone(),
                stage,
                degraded_items,
            })
            .await;
        info!(
            run_id = %run.id,
            stage = %stage,
            degraded_items,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage completed"
        );
        Ok(artifact)
    }

    async fn persist<A: StageArtifact>(&self, run_id: &str, stage: StageName, artifact: &A) -> AppResult<()> {
        let value = serde_json::to_value(artifact)?;
        self.store
            .write_artifact(run_id, stage, &value)
            .await
            .map_err(|e| AppError::storage(format!("Failed to persist {} artifact: {}", stage, e)))
    }

    async fn finish(
        &self,
        mut run: Run,
        status: RunStatus,
        error: Option<String>,
        report: Option<String>,
    ) -> AppResult<RunResult> {
        run.finish(status, error.clone());
        self.store.write_manifest(&run).await?;
        self.events
            .emit(PipelineEvent::RunFinished {
                run_id: run.id.clone(),
                status,
                error: error.clone(),
            })
            .await;

        match status {
            RunStatus::Succeeded => info!(run_id = %run.id, "Run succeeded"),
            _ => warn!(run_id = %run.id, status = ?status, error = ?error, "Run did not complete"),
        }
        Ok(RunResult { run, report })
    }
}
