//! Conversation Variants
//!
//! Focus groups and in-depth interviews share one turn-taking loop. Every
//! prompt embeds the literal transcript so far, so turns are generated
//! strictly one at a time and appended in generation order.

use async_trait::async_trait;
use panelsim_core::{
    EntityProfile, InteractionRecord, InteractorRole, PipelineEvent, RoleSpec, SimulationKind,
};
use panelsim_metrics::{engagement_by_speaker, question_type_counts, response_metrics};
use serde_json::Value;
use tracing::{debug, info};

use super::artifacts::{
    Collected, CollectionArtifact, DesignArtifact, PopulationArtifact, ProcessedArtifact,
    ProcessedData, TranscriptSummary,
};
use super::context::StageContext;
use super::prompts::{
    designer_role, entity_role, entity_turn_prompt, guide_prompt, host_prompt, host_role,
};
use super::schemas::{guide_hints, guide_schema};
use super::variant::SimulationVariant;
use crate::utils::error::{AppError, AppResult};

/// Content recorded for a turn whose generation never succeeded
pub const NO_RESPONSE: &str = "[no response]";

pub const MODERATOR: &str = "Moderator";
pub const INTERVIEWER: &str = "Interviewer";

// ============================================================================
// Focus group
// ============================================================================

pub struct FocusGroupVariant;

#[async_trait]
impl SimulationVariant for FocusGroupVariant {
    fn kind(&self) -> SimulationKind {
        SimulationKind::FocusGroup
    }

    fn entity_prefix(&self) -> &'static str {
        "P"
    }

    async fn design(&self, ctx: &StageContext) -> AppResult<DesignArtifact> {
        design_guide(ctx).await
    }

    /// Moderator opening, then each round the moderator asks and every
    /// participant answers in entity order, then the moderator closes.
    async fn collect(
        &self,
        ctx: &StageContext,
        population: PopulationArtifact,
    ) -> AppResult<CollectionArtifact> {
        let PopulationArtifact { design, entities } = population;
        let rounds = ctx.parameters.round_count;
        let topics = guide_topics(&design.document, &ctx.parameters.topic);
        let moderator = host_role(InteractorRole::Moderator, &ctx.parameters, &design.document);
        let participants: Vec<(&EntityProfile, RoleSpec)> = entities
            .iter()
            .map(|e| (e, entity_role(InteractorRole::Participant, e)))
            .collect();

        let mut transcript = InteractionRecord::new();
        let opening = format!(
            "Open the focus group on \"{}\": welcome the {} participants, explain the \
             ground rules and ask a warm-up question.",
            ctx.parameters.topic,
            participants.len()
        );
        speak_as_host(ctx, &mut transcript, MODERATOR, &moderator, &opening).await?;

        for round in 0..rounds {
            let cue = format!(
                "Round {} of {}. Ask the group one question about: {}",
                round + 1,
                rounds,
                topics[round % topics.len()]
            );
            speak_as_host(ctx, &mut transcript, MODERATOR, &moderator, &cue).await?;

            for (entity, role) in &participants {
                let prompt = entity_turn_prompt(&transcript, entity);
                speak(ctx, &mut transcript, &entity.entity_id, role, &prompt).await?;
            }
            debug!(run_id = %ctx.run_id, round = round + 1, turns = transcript.len(), "Round finished");
        }

        let closing = "Close the session: thank the participants and summarize what you heard.";
        speak_as_host(ctx, &mut transcript, MODERATOR, &moderator, closing).await?;

        info!(
            run_id = %ctx.run_id,
            turns = transcript.len(),
            degraded_turns = transcript.degraded_turns(),
            "Focus group finished"
        );
        Ok(CollectionArtifact {
            design,
            entities,
            collected: Collected::Conversation {
                host: MODERATOR.to_string(),
                transcript,
            },
        })
    }

    fn process(&self, _ctx: &StageContext, collection: CollectionArtifact) -> AppResult<ProcessedArtifact> {
        process_conversation(collection)
    }
}

// ============================================================================
// Interview
// ============================================================================

pub struct InterviewVariant;

#[async_trait]
impl SimulationVariant for InterviewVariant {
    fn kind(&self) -> SimulationKind {
        SimulationKind::Interview
    }

    fn entity_prefix(&self) -> &'static str {
        "I"
    }

    async fn design(&self, ctx: &StageContext) -> AppResult<DesignArtifact> {
        design_guide(ctx).await
    }

    /// Introduction and answer, `round_count - 1` question/answer pairs, then
    /// a closing question and final answer.
    async fn collect(
        &self,
        ctx: &StageContext,
        population: PopulationArtifact,
    ) -> AppResult<CollectionArtifact> {
        let PopulationArtifact { design, entities } = population;
        let respondent = entities
            .first()
            .ok_or_else(|| AppError::pipeline("interview requires a respondent"))?;
        let topics = guide_topics(&design.document, &ctx.parameters.topic);
        let interviewer = host_role(InteractorRole::Interviewer, &ctx.parameters, &design.document);
        let respondent_role = entity_role(InteractorRole::Respondent, respondent);

        let mut cues = vec![format!(
            "Introduce yourself and the purpose of this interview about \"{}\", then ask an \
             easy opening question.",
            ctx.parameters.topic
        )];
        for question in 1..ctx.parameters.round_count {
            cues.push(format!(
                "Question {} of {}. Ask one open question about: {}. Probe on anything \
                 interesting in the last answer.",
                question + 1,
                ctx.parameters.round_count,
                topics[(question - 1) % topics.len()]
            ));
        }
        cues.push(
            "Ask a final closing question, e.g. whether there is anything else they would \
             like to share."
                .to_string(),
        );

        let mut transcript = InteractionRecord::new();
        for cue in &cues {
            speak_as_host(ctx, &mut transcript, INTERVIEWER, &interviewer, cue).await?;
            let prompt = entity_turn_prompt(&transcript, respondent);
            speak(ctx, &mut transcript, &respondent.entity_id, &respondent_role, &prompt).await?;
        }

        info!(
            run_id = %ctx.run_id,
            turns = transcript.len(),
            degraded_turns = transcript.degraded_turns(),
            "Interview finished"
        );
        Ok(CollectionArtifact {
            design,
            entities,
            collected: Collected::Conversation {
                host: INTERVIEWER.to_string(),
                transcript,
            },
        })
    }

    fn process(&self, _ctx: &StageContext, collection: CollectionArtifact) -> AppResult<ProcessedArtifact> {
        process_conversation(collection)
    }
}

// ============================================================================
// Shared
// ============================================================================

async fn design_guide(ctx: &StageContext) -> AppResult<DesignArtifact> {
    let schema = guide_schema();
    let prompt = guide_prompt(&ctx.parameters, &schema, ctx.parameters.round_count);
    let resolved = ctx
        .structured(
            "design.guide",
            &designer_role(),
            &prompt,
            &schema,
            &guide_hints(&ctx.parameters),
        )
        .await?;
    Ok(DesignArtifact {
        degraded: resolved.is_degraded(),
        document: resolved.object.value,
    })
}

/// Guide topics, or the run topic when the guide lists none
fn guide_topics(guide: &Value, fallback: &str) -> Vec<String> {
    let topics: Vec<String> = guide
        .get("topics")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if topics.is_empty() {
        vec![fallback.to_string()]
    } else {
        topics
    }
}

async fn speak_as_host(
    ctx: &StageContext,
    transcript: &mut InteractionRecord,
    host: &str,
    role: &RoleSpec,
    cue: &str,
) -> AppResult<()> {
    let prompt = host_prompt(transcript, cue);
    speak(ctx, transcript, host, role, &prompt).await
}

/// Generate one turn and append it. A turn that exhausts its retries is
/// recorded as a degraded placeholder and the conversation continues.
async fn speak(
    ctx: &StageContext,
    transcript: &mut InteractionRecord,
    speaker: &str,
    role: &RoleSpec,
    prompt: &str,
) -> AppResult<()> {
    let label = format!("collect.turn[{}].{}", transcript.len(), speaker);
    let outcome = ctx.text(&label, role, prompt, NO_RESPONSE).await?;
    let sequence = transcript.append(speaker, outcome.text, outcome.degraded);
    ctx.events
        .emit(PipelineEvent::TurnAppended {
            sequence,
            speaker: speaker.to_string(),
            degraded: outcome.degraded,
        })
        .await;
    Ok(())
}

fn process_conversation(collection: CollectionArtifact) -> AppResult<ProcessedArtifact> {
    let summary = match &collection.collected {
        Collected::Conversation { host, transcript } => TranscriptSummary {
            host: host.clone(),
            turn_count: transcript.len(),
            engagement: engagement_by_speaker(transcript),
            response_metrics: response_metrics(transcript, Some(host.as_str())),
            question_types: question_type_counts(transcript, host),
        },
        Collected::Survey { .. } => {
            return Err(AppError::pipeline(
                "conversation processing received survey responses",
            ))
        }
    };

    let CollectionArtifact {
        design,
        entities,
        collected,
    } = collection;
    Ok(ProcessedArtifact {
        design,
        entities,
        collected,
        processed: ProcessedData::Conversation(summary),
    })
}
