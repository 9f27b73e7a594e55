//! Role Instructions and Prompt Builders
//!
//! Prompt wording is deliberately plain; the pipeline's guarantees do not
//! depend on it. What matters is the structure: entity prompts carry the
//! requested `entity_id`, survey prompts carry the rendered questionnaire,
//! and every conversation prompt embeds the full transcript so far.

use panelsim_core::{EntityProfile, InteractionRecord, InteractorRole, RoleSpec, RunParameters};
use panelsim_structured::Schema;
use serde_json::Value;

use super::schemas::questions;

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn shape(schema: &Schema) -> String {
    pretty(&schema.example())
}

fn brief(parameters: &RunParameters) -> String {
    let mut text = format!(
        "Topic: {}\nTarget audience: {}",
        parameters.topic, parameters.target_audience
    );
    if !parameters.objectives.trim().is_empty() {
        text.push_str(&format!("\nResearch objectives: {}", parameters.objectives));
    }
    text
}

// ============================================================================
// Roles
// ============================================================================

pub fn designer_role() -> RoleSpec {
    RoleSpec::designer(
        "You are an experienced market research designer. You write clear, unbiased \
         research instruments and always return them as a single ```json fenced block.",
    )
}

pub fn entity_generator_role() -> RoleSpec {
    RoleSpec::entity_generator(
        "You create realistic, diverse personas for qualitative and quantitative research. \
         Return exactly one persona as a ```json fenced block and nothing else.",
    )
}

pub fn analyst_role() -> RoleSpec {
    RoleSpec::analyst(
        "You are a senior research analyst. Write a concise narrative analysis, then a single \
         ```json fenced block with the requested figures. Numbers must be numbers.",
    )
}

/// Interactor role for a host (moderator / interviewer)
pub fn host_role(role: InteractorRole, parameters: &RunParameters, guide: &Value) -> RoleSpec {
    let name = match role {
        InteractorRole::Interviewer => "Interviewer",
        _ => "Moderator",
    };
    RoleSpec::interactor(
        role,
        name,
        format!(
            "You are the {} of a research session.\n{}\n\nGuide:\n{}\n\n\
             Ask one clear, neutral question per turn. Reply with your next line only.",
            name.to_lowercase(),
            brief(parameters),
            pretty(guide)
        ),
    )
}

/// Interactor role speaking as an entity
pub fn entity_role(role: InteractorRole, entity: &EntityProfile) -> RoleSpec {
    RoleSpec::interactor(
        role,
        entity.entity_id.clone(),
        format!(
            "You are {} ({}). Stay in character and answer as this person would, \
             following their response style.\n\nYour profile:\n{}",
            entity.name(),
            entity.entity_id,
            pretty(&entity.profile)
        ),
    )
}

// ============================================================================
// Design / entities
// ============================================================================

pub fn questionnaire_prompt(parameters: &RunParameters, schema: &Schema) -> String {
    format!(
        "Design a survey questionnaire.\n{}\n\n\
         Use question types from: multiple_choice, checkbox, likert_scale, ranking, open_ended. \
         Give every question a unique question_id (Q1, Q2, ...). Provide options for \
         multiple_choice, checkbox and ranking questions and scale_labels for likert_scale.\n\n\
         Return JSON with this shape:\n{}",
        brief(parameters),
        shape(schema)
    )
}

pub fn guide_prompt(parameters: &RunParameters, schema: &Schema, sessions: usize) -> String {
    format!(
        "Design a discussion guide for a session of {} rounds.\n{}\n\n\
         Return JSON with this shape:\n{}",
        sessions,
        brief(parameters),
        shape(schema)
    )
}

pub fn entity_prompt(
    parameters: &RunParameters,
    design_title: &str,
    entity_id: &str,
    index: usize,
    schema: &Schema,
) -> String {
    format!(
        "Create persona {} of {} for the study \"{}\".\n{}\n\n\
         Use exactly this identifier: \"entity_id\": \"{}\"\n\n\
         Return JSON with this shape:\n{}",
        index + 1,
        parameters.entity_count,
        design_title,
        brief(parameters),
        entity_id,
        shape(schema)
    )
}

// ============================================================================
// Survey
// ============================================================================

/// Render a questionnaire in the line format respondents answer from.
pub fn render_questionnaire(questionnaire: &Value) -> String {
    let mut out = String::new();
    if let Some(title) = questionnaire.get("survey_title").and_then(Value::as_str) {
        out.push_str(&format!("# {}\n", title));
    }
    if let Some(intro) = questionnaire.get("survey_introduction").and_then(Value::as_str) {
        out.push_str(&format!("{}\n", intro));
    }

    for question in questions(questionnaire) {
        let id = question.get("question_id").and_then(Value::as_str).unwrap_or("?");
        let kind = question.get("question_type").and_then(Value::as_str).unwrap_or("open_ended");
        let required = question.get("required").and_then(Value::as_bool).unwrap_or(false);
        let text = question.get("question_text").and_then(Value::as_str).unwrap_or("");

        out.push_str(&format!(
            "\n**Question ID:** `{}` ({})\n**Type:** {}\n**Text:** {}\n",
            id,
            if required { "Required" } else { "Optional" },
            kind,
            text
        ));

        let list = |key: &str| -> Vec<&str> {
            question
                .get(key)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default()
        };

        match kind {
            "likert_scale" => {
                let labels = list("scale_labels");
                let points = question
                    .get("scale_points")
                    .and_then(Value::as_u64)
                    .unwrap_or(labels.len() as u64);
                out.push_str(&format!("**Scale (1-{}):**\n", points));
                for label in labels {
                    out.push_str(&format!("- `{}`\n", label));
                }
            }
            "open_ended" => out.push_str("**Response:** (Provide your text answer)\n"),
            _ => {
                out.push_str("**Options:**\n");
                for option in list("options") {
                    out.push_str(&format!("- `{}`\n", option));
                }
            }
        }
    }
    out
}

pub fn survey_response_prompt(entity: &EntityProfile, questionnaire: &Value, schema: &Schema) -> String {
    format!(
        "You are respondent {}. Complete the survey below in character.\n\
         Answer with a JSON array containing one object per question:\n{}\n\n\
         Use a string for multiple_choice, likert_scale and open_ended answers, and a list \
         of strings for checkbox and ranking answers. Use null to skip an optional question.\n\n{}",
        entity.entity_id,
        shape(schema),
        render_questionnaire(questionnaire)
    )
}

// ============================================================================
// Conversation
// ============================================================================

fn transcript_block(transcript: &InteractionRecord) -> String {
    if transcript.is_empty() {
        "(the session has not started yet)".to_string()
    } else {
        transcript.render()
    }
}

pub fn host_prompt(transcript: &InteractionRecord, cue: &str) -> String {
    format!(
        "Transcript so far:\n{}\n\n{}",
        transcript_block(transcript),
        cue
    )
}

pub fn entity_turn_prompt(transcript: &InteractionRecord, entity: &EntityProfile) -> String {
    format!(
        "Transcript so far:\n{}\n\nRespond as {} to the latest question. Reply with your answer only.",
        transcript_block(transcript),
        entity.entity_id
    )
}

// ============================================================================
// Analysis
// ============================================================================

pub fn analysis_prompt(
    parameters: &RunParameters,
    material: &str,
    entity_ids: &[String],
    schema: &Schema,
) -> String {
    format!(
        "Analyze this {} study.\n{}\n\n{}\n\n\
         Write the narrative first. Then add a ```json block with this shape:\n{}\n\n\
         Sentiment values are fractions that sum to 1.0. Include \"entity_sentiment\" with a \
         {{positive, neutral, negative}} entry for each of: {}.",
        parameters.kind,
        brief(parameters),
        material,
        shape(schema),
        entity_ids.join(", ")
    )
}
