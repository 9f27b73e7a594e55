//! Survey Variant
//!
//! Questionnaire design, independent respondent answers collected through
//! the fan-out executor, and per-question aggregation with per-type answer
//! validation.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use panelsim_core::{EntityProfile, InteractionRecord, InteractorRole, SimulationKind};
use panelsim_structured::{Schema, SeedHints};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::artifacts::{
    AggregatedQuestion, Collected, CollectionArtifact, DesignArtifact, PopulationArtifact,
    ProcessedArtifact, ProcessedData, QuestionResponse, SurveyMetadata, SurveyResponse,
    SurveySummary,
};
use super::context::StageContext;
use super::fanout::collect_results;
use super::prompts::{designer_role, entity_role, questionnaire_prompt, survey_response_prompt};
use super::schemas::{answers_schema, questionnaire_hints, questionnaire_schema, questions};
use super::variant::SimulationVariant;
use crate::utils::error::{AppError, AppResult};

pub struct SurveyVariant;

#[async_trait]
impl SimulationVariant for SurveyVariant {
    fn kind(&self) -> SimulationKind {
        SimulationKind::Survey
    }

    fn entity_prefix(&self) -> &'static str {
        "R"
    }

    async fn design(&self, ctx: &StageContext) -> AppResult<DesignArtifact> {
        let schema = questionnaire_schema();
        let prompt = questionnaire_prompt(&ctx.parameters, &schema);
        let resolved = ctx
            .structured(
                "design.questionnaire",
                &designer_role(),
                &prompt,
                &schema,
                &questionnaire_hints(&ctx.parameters),
            )
            .await?;

        let degraded = resolved.is_degraded();
        let document = resolved.object.value;
        info!(
            run_id = %ctx.run_id,
            questions = questions(&document).len(),
            degraded,
            "Questionnaire ready"
        );
        Ok(DesignArtifact { document, degraded })
    }

    async fn collect(
        &self,
        ctx: &StageContext,
        population: PopulationArtifact,
    ) -> AppResult<CollectionArtifact> {
        let PopulationArtifact { design, entities } = population;
        let schema = answers_schema();

        let results = ctx
            .fan_out
            .run("collect.survey", entities.iter().collect(), |index, entity| {
                let schema = &schema;
                let questionnaire = &design.document;
                async move { answer_survey(ctx, entity, index, questionnaire, schema).await }
            })
            .await;
        let responses = collect_results(results)?;

        Ok(CollectionArtifact {
            design,
            entities,
            collected: Collected::Survey { responses },
        })
    }

    fn process(&self, ctx: &StageContext, collection: CollectionArtifact) -> AppResult<ProcessedArtifact> {
        let summary = match &collection.collected {
            Collected::Survey { responses } => {
                aggregate_responses(&collection.design, responses, &ctx.run_id)
            }
            Collected::Conversation { .. } => {
                return Err(AppError::pipeline(
                    "survey processing received a conversation transcript",
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
            processed: ProcessedData::Survey(summary),
        })
    }
}

// ============================================================================
// Collection
// ============================================================================

async fn answer_survey(
    ctx: &StageContext,
    entity: &EntityProfile,
    index: usize,
    questionnaire: &Value,
    schema: &Schema,
) -> AppResult<SurveyResponse> {
    let role = entity_role(InteractorRole::Respondent, entity);
    let prompt = survey_response_prompt(entity, questionnaire, schema);
    let label = format!("collect.survey[{}]", entity.entity_id);
    let resolved = ctx
        .structured(&label, &role, &prompt, schema, &SeedHints::new())
        .await?;

    let degraded = resolved.is_degraded();
    let answers = match resolved.object.value {
        Value::Array(items) if !degraded => items,
        _ => null_answers(questionnaire),
    };

    let missing_required = missing_required(questionnaire, &answers);
    if !missing_required.is_empty() {
        warn!(
            respondent = %entity.entity_id,
            missing = ?missing_required,
            "Respondent skipped required questions"
        );
    }

    Ok(SurveyResponse {
        respondent_id: entity.entity_id.clone(),
        index,
        answers,
        missing_required,
        degraded,
        error: resolved.error,
    })
}

/// Fallback answer set: one null response per question
pub fn null_answers(questionnaire: &Value) -> Vec<Value> {
    questions(questionnaire)
        .into_iter()
        .filter_map(|q| q.get("question_id").and_then(Value::as_str))
        .map(|id| json!({"question_id": id, "response": Value::Null}))
        .collect()
}

/// Required question ids without a non-null answer
pub fn missing_required(questionnaire: &Value, answers: &[Value]) -> Vec<String> {
    let answered: HashSet<&str> = answers
        .iter()
        .filter(|a| a.get("response").is_some_and(|r| !r.is_null()))
        .filter_map(|a| a.get("question_id").and_then(Value::as_str))
        .collect();

    questions(questionnaire)
        .into_iter()
        .filter(|q| q.get("required").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|q| q.get("question_id").and_then(Value::as_str))
        .filter(|id| !answered.contains(id))
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Processing
// ============================================================================

fn string_list(question: &Value, key: &str) -> Vec<String> {
    question
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn stringify(value: &Value) -> Value {
    match value {
        Value::String(_) | Value::Null => value.clone(),
        other => Value::String(other.to_string()),
    }
}

/// Check an answer against its question type.
///
/// Returns the value to record, or `None` when the answer is invalid for
/// the type. List types accept a list, null or an empty string; scalar
/// types coerce anything else to a string.
fn validate_answer(question_type: &str, response: &Value) -> Option<Value> {
    match question_type {
        "checkbox" | "ranking" => match response {
            Value::Array(_) | Value::Null => Some(response.clone()),
            Value::String(s) if s.is_empty() => Some(response.clone()),
            _ => None,
        },
        _ => Some(stringify(response)),
    }
}

/// Aggregate every respondent's answers per question.
///
/// Each respondent's error count grows by one for every answer that is
/// invalid for its type or names an unknown question, once for a fallback
/// answer set and once if any required question went unanswered.
pub fn aggregate_responses(
    design: &DesignArtifact,
    responses: &[SurveyResponse],
    simulation_id: &str,
) -> SurveySummary {
    let mut questions_aggregated = BTreeMap::new();
    let mut question_order = Vec::new();
    for question in questions(&design.document) {
        let Some(id) = question.get("question_id").and_then(Value::as_str) else {
            continue;
        };
        if questions_aggregated.contains_key(id) {
            continue;
        }
        question_order.push(id.to_string());
        questions_aggregated.insert(
            id.to_string(),
            AggregatedQuestion {
                text: question
                    .get("question_text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                question_type: question
                    .get("question_type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                required: question.get("required").and_then(Value::as_bool).unwrap_or(false),
                options: string_list(question, "options"),
                scale_labels: string_list(question, "scale_labels"),
                scale_points: question.get("scale_points").and_then(Value::as_u64),
                responses: Vec::new(),
            },
        );
    }

    let mut respondent_error_counts: BTreeMap<String, usize> = BTreeMap::new();
    for response in responses {
        let mut errors = usize::from(response.degraded);
        if !response.missing_required.is_empty() {
            errors += 1;
        }

        for answer in &response.answers {
            let Some(question_id) = answer.get("question_id").and_then(Value::as_str) else {
                errors += 1;
                continue;
            };
            let Some(question) = questions_aggregated.get_mut(question_id) else {
                debug!(
                    respondent = %response.respondent_id,
                    question_id,
                    "Discarding answer to unknown question"
                );
                errors += 1;
                continue;
            };

            let value = answer.get("response").unwrap_or(&Value::Null);
            match validate_answer(&question.question_type, value) {
                Some(response_value) => question.responses.push(QuestionResponse {
                    respondent_id: response.respondent_id.clone(),
                    response: response_value,
                }),
                None => {
                    debug!(
                        respondent = %response.respondent_id,
                        question_id,
                        question_type = %question.question_type,
                        "Answer does not match question type"
                    );
                    errors += 1;
                }
            }
        }

        if errors > 0 {
            *respondent_error_counts
                .entry(response.respondent_id.clone())
                .or_default() += errors;
        }
    }

    info!(
        respondents = responses.len(),
        questions = question_order.len(),
        respondents_with_errors = respondent_error_counts.len(),
        "Survey responses aggregated"
    );

    SurveySummary {
        survey_metadata: SurveyMetadata {
            survey_title: design.title().to_string(),
            simulation_id: simulation_id.to_string(),
            num_respondents_processed: responses.len(),
            respondent_error_counts,
        },
        questions_aggregated,
        question_order,
    }
}

/// Free-text answers as a transcript, one turn per non-empty open-ended
/// answer, so the aggregator can recompute word counts for surveys.
pub fn open_ended_record(summary: &SurveySummary, entities: &[EntityProfile]) -> InteractionRecord {
    let mut record = InteractionRecord::new();
    for entity in entities {
        for id in &summary.question_order {
            let Some(question) = summary.questions_aggregated.get(id) else {
                continue;
            };
            if question.question_type != "open_ended" {
                continue;
            }
            let text = question
                .responses
                .iter()
                .find(|r| r.respondent_id == entity.entity_id)
                .and_then(|r| r.response.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty());
            if let Some(text) = text {
                record.append(entity.entity_id.clone(), text, entity.degraded);
            }
        }
    }
    record
}
