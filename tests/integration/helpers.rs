//! Shared fixtures: run parameters, a fast-retry configuration and scripted
//! responders that produce schema-valid output for every role.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use panelsim::services::pipeline::{PipelineController, RunResult};
use panelsim::{InMemoryArtifactStore, PanelsimConfig};
use panelsim_core::{InteractorRole, RoleKind, RunParameters, SimulationKind};
use panelsim_llm::ScriptedClient;
use serde_json::{json, Value};

pub fn params(kind: SimulationKind, entities: usize, rounds: usize) -> RunParameters {
    RunParameters {
        kind,
        topic: "Meal kit subscriptions".to_string(),
        objectives: "Understand why people cancel".to_string(),
        target_audience: "Working parents".to_string(),
        entity_count: entities,
        round_count: rounds,
    }
}

/// Default configuration with millisecond backoff
pub fn fast_config() -> PanelsimConfig {
    let mut config = PanelsimConfig::default();
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 4;
    config
}

pub fn fenced(value: &Value) -> String {
    format!(
        "Here is the requested data.\n\n```json\n{}\n```\n",
        serde_json::to_string_pretty(value).unwrap()
    )
}

/// Entity id the prompt asked for (`"entity_id": "R003"`)
pub fn requested_entity_id(prompt: &str) -> String {
    let marker = "\"entity_id\": \"";
    let start = prompt.find(marker).map(|i| i + marker.len()).unwrap();
    let end = prompt[start..].find('"').unwrap();
    prompt[start..start + end].to_string()
}

pub fn entity_json(id: &str) -> Value {
    json!({
        "entity_id": id,
        "name": format!("Persona {}", id),
        "demographics": {
            "age": 34,
            "gender": "Female",
            "location": "Denver, CO",
            "occupation": "Pharmacist",
            "income_annual_usd": 82000
        },
        "psychographics": {
            "personality_traits": ["Organized"],
            "values": ["Health"],
            "interests": ["Cooking"]
        },
        "behaviors": {
            "decision_making_style": "Deliberate",
            "shopping_preferences": ["Online"]
        },
        "attitudes": {
            "sentiment_towards_topic": "Mixed",
            "opinions": "Convenient but pricey"
        },
        "response_style": {"approach": "Direct"},
        "household_size": 4
    })
}

/// A fixed five-question form
pub fn questionnaire() -> Value {
    json!({
        "survey_title": "Meal Kit Survey",
        "survey_introduction": "Five quick questions.",
        "sections": [{
            "section_title": "Usage",
            "questions": [
                {"question_id": "Q1", "question_text": "How often do you order?", "question_type": "multiple_choice",
                 "required": true, "options": ["Weekly", "Monthly", "Rarely"]},
                {"question_id": "Q2", "question_text": "Which cuisines do you pick?", "question_type": "checkbox",
                 "options": ["Italian", "Mexican", "Thai"]},
                {"question_id": "Q3", "question_text": "How satisfied are you?", "question_type": "likert_scale",
                 "required": true, "scale_points": 5,
                 "scale_labels": ["Very low", "Low", "Neutral", "High", "Very high"]},
                {"question_id": "Q4", "question_text": "Rank what matters most.", "question_type": "ranking",
                 "options": ["Price", "Taste", "Time"]},
                {"question_id": "Q5", "question_text": "Why might you cancel?", "question_type": "open_ended"}
            ]
        }]
    })
}

pub fn answers_json() -> Value {
    json!([
        {"question_id": "Q1", "response": "Weekly"},
        {"question_id": "Q2", "response": ["Italian", "Thai"]},
        {"question_id": "Q3", "response": "High"},
        {"question_id": "Q4", "response": ["Taste", "Time", "Price"]},
        {"question_id": "Q5", "response": "The price keeps going up and the portions are small"}
    ])
}

pub fn analysis_text() -> String {
    format!(
        "Respondents value convenience but are sensitive to price.\n\n{}",
        fenced(&json!({
            "summary": "Convenience wins, price loses",
            "themes": ["price sensitivity", "convenience"],
            "sentiment": {"positive": 0.4, "neutral": 0.35, "negative": 0.25},
            "key_findings": ["Most order weekly"]
        }))
    )
}

pub fn guide() -> Value {
    json!({
        "title": "Meal Kit Discussion Guide",
        "objectives": ["Cancellation drivers"],
        "topics": ["First order", "Price", "Cancelling"]
    })
}

/// Scripted backend answering every survey role with valid output
pub fn survey_client() -> ScriptedClient {
    ScriptedClient::new()
        .respond(RoleKind::Designer, fenced(&questionnaire()))
        .respond_with(RoleKind::EntityGenerator, |_, prompt| {
            fenced(&entity_json(&requested_entity_id(prompt)))
        })
        .respond(
            RoleKind::Interactor(InteractorRole::Respondent),
            fenced(&answers_json()),
        )
        .respond(RoleKind::Analyst, analysis_text())
}

/// Scripted backend for conversations. Every turn is unique text carrying a
/// running counter; entity turns also name the speaker.
pub fn conversation_client() -> ScriptedClient {
    let counter = Arc::new(AtomicUsize::new(0));
    let host_counter = counter.clone();
    let entity_counter = counter.clone();
    let respondent_counter = counter;
    let interviewer_counter = Arc::new(AtomicUsize::new(0));

    ScriptedClient::new()
        .respond(RoleKind::Designer, fenced(&guide()))
        .respond_with(RoleKind::EntityGenerator, |_, prompt| {
            fenced(&entity_json(&requested_entity_id(prompt)))
        })
        .respond_with(RoleKind::Interactor(InteractorRole::Moderator), move |_, _| {
            format!(
                "Moderator question {}: what do you think about it?",
                host_counter.fetch_add(1, Ordering::SeqCst)
            )
        })
        .respond_with(RoleKind::Interactor(InteractorRole::Interviewer), move |_, _| {
            format!(
                "Interviewer question {}: how did that feel?",
                interviewer_counter.fetch_add(1, Ordering::SeqCst)
            )
        })
        .respond_with(RoleKind::Interactor(InteractorRole::Participant), move |role, _| {
            format!(
                "{} answer {}: um I like the recipes but the price is high",
                role.name(),
                entity_counter.fetch_add(1, Ordering::SeqCst)
            )
        })
        .respond_with(RoleKind::Interactor(InteractorRole::Respondent), move |role, _| {
            format!(
                "{} answer {}: it saved me time on weeknights",
                role.name(),
                respondent_counter.fetch_add(1, Ordering::SeqCst)
            )
        })
        .respond(RoleKind::Analyst, analysis_text())
}

pub async fn run_with(
    client: ScriptedClient,
    config: PanelsimConfig,
    run_id: &str,
    parameters: RunParameters,
) -> (RunResult, Arc<InMemoryArtifactStore>, Arc<ScriptedClient>) {
    let store = Arc::new(InMemoryArtifactStore::new());
    let client = Arc::new(client);
    let controller = PipelineController::new(store.clone(), client.clone(), config);
    let result = controller.run(run_id, parameters).await.unwrap();
    (result, store, client)
}
