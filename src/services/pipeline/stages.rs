//! Shared Stages
//!
//! Entity generation, analysis and reporting run the same way for every
//! simulation kind.

use std::collections::{BTreeMap, HashSet};

use panelsim_core::{AnalysisArtifact, EntityProfile, InteractionRecord, StageName};
use panelsim_metrics::{reconcile, RawArtifacts, ReconcileOptions};
use panelsim_structured::split_narrative;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::artifacts::{
    AnalyzedArtifact, Collected, DesignArtifact, PopulationArtifact, ProcessedArtifact,
    ProcessedData, ReportArtifact, StageArtifact,
};
use super::context::StageContext;
use super::fanout::collect_results;
use super::prompts::{analysis_prompt, analyst_role, entity_generator_role, entity_prompt};
use super::report::render_report;
use super::schemas::{analysis_hints, analysis_schema, entity_hints, entity_id, entity_schema};
use super::survey::open_ended_record;
use crate::utils::error::AppResult;

// ============================================================================
// Generate-Entities
// ============================================================================

/// One entity per index, generated concurrently. The result always has
/// `entity_count` profiles in index order; failed generations are replaced
/// by degraded fallback profiles.
pub async fn generate_entities(
    ctx: &StageContext,
    prefix: &str,
    design: DesignArtifact,
) -> AppResult<PopulationArtifact> {
    let schema = entity_schema();
    let role = entity_generator_role();
    let title = design.title().to_string();
    let indices: Vec<usize> = (0..ctx.parameters.entity_count).collect();

    let results = ctx
        .fan_out
        .run("generate_entities", indices, |index, _| {
            let (schema, role, title) = (&schema, &role, &title);
            async move {
                let requested = entity_id(prefix, index);
                let prompt = entity_prompt(&ctx.parameters, title, &requested, index, schema);
                let label = format!("generate_entities[{}]", index);
                let resolved = ctx
                    .structured(&label, role, &prompt, schema, &entity_hints(prefix, index))
                    .await?;
                let degraded = resolved.is_degraded();
                Ok(EntityProfile::new(index, resolved.object.value, degraded))
            }
        })
        .await;

    let mut entities = collect_results(results)?;
    assign_unique_ids(&mut entities, prefix);

    let population = PopulationArtifact { design, entities };
    info!(
        run_id = %ctx.run_id,
        entities = population.entities.len(),
        degraded = population.degraded_items(),
        "Population generated"
    );
    Ok(population)
}

/// Entity ids key transcripts and per-entity metrics, so they must be unique
/// within a run. A repeated id is replaced by the id the prompt requested, or
/// by a suffixed form of it when that id is claimed elsewhere in the population.
fn assign_unique_ids(entities: &mut [EntityProfile], prefix: &str) {
    let mut taken: HashSet<String> = entities.iter().map(|e| e.entity_id.clone()).collect();
    let mut kept = HashSet::new();
    for entity in entities.iter_mut() {
        if kept.insert(entity.entity_id.clone()) {
            continue;
        }
        let requested = entity_id(prefix, entity.index);
        let mut replacement = requested.clone();
        let mut suffix = 2;
        while taken.contains(&replacement) {
            replacement = format!("{}_{}", requested, suffix);
            suffix += 1;
        }
        warn!(
            duplicate = %entity.entity_id,
            replacement = %replacement,
            "Duplicate entity id"
        );
        taken.insert(replacement.clone());
        kept.insert(replacement.clone());
        if let Some(fields) = entity.profile.as_object_mut() {
            fields.insert("entity_id".to_string(), json!(replacement));
        }
        entity.entity_id = replacement;
    }
}

// ============================================================================
// Analyze
// ============================================================================

/// Material the analyst reads: the processed data plus, for conversations,
/// the transcript itself.
fn analysis_material(processed: &ProcessedArtifact) -> String {
    let data = match &processed.processed {
        ProcessedData::Survey(summary) => serde_json::to_string_pretty(summary),
        ProcessedData::Conversation(summary) => serde_json::to_string_pretty(summary),
    }
    .unwrap_or_default();

    match &processed.collected {
        Collected::Conversation { transcript, .. } => {
            format!("Processed data:\n{}\n\nTranscript:\n{}", data, transcript.render())
        }
        Collected::Survey { .. } => format!("Processed survey data:\n{}", data),
    }
}

/// Ask the analyst for a narrative plus a structured block, then reconcile
/// the reported figures against the raw artifacts.
pub async fn analyze(ctx: &StageContext, processed: ProcessedArtifact) -> AppResult<AnalyzedArtifact> {
    let schema = analysis_schema();
    let entity_ids: Vec<String> = processed.entities.iter().map(|e| e.entity_id.clone()).collect();
    let prompt = analysis_prompt(&ctx.parameters, &analysis_material(&processed), &entity_ids, &schema);
    let hints = analysis_hints(ctx.sentiment_default.triple(), "no valid analysis block");

    let resolved = ctx
        .structured("analyze", &analyst_role(), &prompt, &schema, &hints)
        .await?;
    let degraded = resolved.is_degraded();
    let mut structured = resolved.object.value;

    let narrative = if degraded {
        let reason = resolved.error.as_deref().unwrap_or("no valid analysis block");
        let narrative = format!("Analysis unavailable: {}", reason);
        if let Some(fields) = structured.as_object_mut() {
            fields.insert("summary".to_string(), json!(narrative));
        }
        narrative
    } else {
        let prose = resolved
            .raw
            .as_deref()
            .map(|raw| split_narrative(raw).0)
            .unwrap_or_default();
        if prose.is_empty() {
            structured
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        } else {
            prose
        }
    };

    let survey_record: Option<InteractionRecord> = match &processed.processed {
        ProcessedData::Survey(summary) => Some(open_ended_record(summary, &processed.entities)),
        ProcessedData::Conversation(_) => None,
    };
    let (transcript, host) = match &processed.collected {
        Collected::Conversation { host, transcript } => (Some(transcript), Some(host.as_str())),
        Collected::Survey { .. } => (survey_record.as_ref(), None),
    };

    let options = ReconcileOptions {
        sentiment_default: ctx.sentiment_default,
        ..ReconcileOptions::default()
    };
    let raw = RawArtifacts {
        entities: &processed.entities,
        transcript,
        host,
    };
    let metrics = reconcile(&structured, raw, &options);

    info!(
        run_id = %ctx.run_id,
        degraded,
        discrepancies = metrics.discrepancies.len(),
        substituted = metrics.substituted.len(),
        "Analysis reconciled"
    );

    let ProcessedArtifact {
        design,
        entities,
        collected,
        processed,
    } = processed;
    Ok(AnalyzedArtifact {
        design,
        entities,
        collected,
        processed,
        analysis: AnalysisArtifact {
            narrative,
            structured,
            degraded,
        },
        metrics,
    })
}

// ============================================================================
// Report
// ============================================================================

/// Degraded item counts of every stage, recovered from the carried artifacts
pub fn degraded_by_stage(analyzed: &AnalyzedArtifact) -> BTreeMap<String, usize> {
    let counts = [
        (StageName::Design, analyzed.design.degraded_items()),
        (
            StageName::GenerateEntities,
            analyzed.entities.iter().filter(|e| e.degraded).count(),
        ),
        (StageName::CollectInteractions, analyzed.collected.degraded_items()),
        (StageName::Process, 0),
        (StageName::Analyze, analyzed.degraded_items()),
    ];
    counts
        .into_iter()
        .map(|(stage, count)| (stage.as_str().to_string(), count))
        .collect()
}

pub fn report(ctx: &StageContext, analyzed: AnalyzedArtifact) -> AppResult<ReportArtifact> {
    let degraded = degraded_by_stage(&analyzed);
    let markdown = render_report(&ctx.run_id, &ctx.parameters, &analyzed, &degraded);
    Ok(ReportArtifact {
        markdown,
        degraded_by_stage: degraded,
        metrics: analyzed.metrics,
    })
}
