//! Structured Output Schemas
//!
//! Required-field schemas for every structured request the pipeline makes,
//! and the deterministic seed hints used when a request falls back.

use panelsim_core::RunParameters;
use panelsim_metrics::SentimentTriple;
use panelsim_structured::{Schema, SeedHints};
use serde_json::{json, Value};

/// Question types a questionnaire may use
pub const QUESTION_TYPES: [&str; 5] = [
    "multiple_choice",
    "checkbox",
    "likert_scale",
    "ranking",
    "open_ended",
];

fn string_list() -> Schema {
    Schema::array(None, Schema::string(None))
}

/// Entity Profile: nested demographics / psychographics / behaviors /
/// attitudes / response style. Extra fields are kept untouched.
pub fn entity_schema() -> Schema {
    Schema::object(Some("Entity profile"))
        .field("entity_id", Schema::string(Some("Identifier assigned in the prompt")))
        .field("name", Schema::string(None))
        .field(
            "demographics",
            Schema::object(None)
                .field("age", Schema::number(None))
                .field("gender", Schema::string(None))
                .field("location", Schema::string(None))
                .field("occupation", Schema::string(None))
                .field("income_annual_usd", Schema::number(None)),
        )
        .field(
            "psychographics",
            Schema::object(None)
                .field("personality_traits", string_list())
                .field("values", string_list())
                .field("interests", string_list()),
        )
        .field(
            "behaviors",
            Schema::object(None)
                .field("decision_making_style", Schema::string(None))
                .field("shopping_preferences", string_list()),
        )
        .field(
            "attitudes",
            Schema::object(None)
                .field("sentiment_towards_topic", Schema::string(None))
                .field("opinions", Schema::string(None)),
        )
        .field(
            "response_style",
            Schema::object(None).field("approach", Schema::string(None)),
        )
}

/// Entity id requested for the entity at `index`, e.g. `R003`
pub fn entity_id(prefix: &str, index: usize) -> String {
    format!("{}{:03}", prefix, index + 1)
}

/// Seed for a fallback entity. Numbering is one-based like the ids.
pub fn entity_hints(prefix: &str, index: usize) -> SeedHints {
    let number = index + 1;
    SeedHints::new()
        .set("entity_id", json!(format!("{}_fallback", entity_id(prefix, index))))
        .set("name", json!(format!("Fallback Persona {}", number)))
        .set("demographics.age", json!(18 + (number * 7) % 58))
        .set("demographics.income_annual_usd", json!(50_000))
        .set("attitudes.sentiment_towards_topic", json!("Neutral"))
}

fn question_schema() -> Schema {
    Schema::object(None)
        .field("question_id", Schema::string(None))
        .field("question_text", Schema::string(None))
        .field("question_type", Schema::string(Some("One of the supported question types")))
        .optional_field("required", Schema::boolean(None))
        .optional_field("options", string_list())
        .optional_field("scale_labels", string_list())
        .optional_field("scale_points", Schema::integer(None))
}

/// Survey questionnaire
pub fn questionnaire_schema() -> Schema {
    Schema::object(Some("Survey questionnaire"))
        .field("survey_title", Schema::string(None))
        .optional_field("survey_introduction", Schema::string(None))
        .field(
            "sections",
            Schema::array(
                None,
                Schema::object(None)
                    .optional_field("section_title", Schema::string(None))
                    .field("questions", Schema::array(None, question_schema()).with_min_items(1)),
            )
            .with_min_items(1),
        )
}

/// Minimal three-question form used when the designer never produces a
/// usable questionnaire
pub fn questionnaire_hints(parameters: &RunParameters) -> SeedHints {
    SeedHints::new()
        .set("survey_title", json!(format!("{} Survey (Fallback)", parameters.topic)))
        .set(
            "survey_introduction",
            json!(format!("A short survey about {}.", parameters.topic)),
        )
        .set(
            "sections",
            json!([{
                "section_title": "General",
                "questions": [
                    {
                        "question_id": "Q1",
                        "question_text": "Which age band are you in?",
                        "question_type": "multiple_choice",
                        "required": true,
                        "options": ["18-24", "25-34", "35-44", "45-54", "55-64", "65+"]
                    },
                    {
                        "question_id": "Q2",
                        "question_text": format!("What is your overall opinion of {}?", parameters.topic),
                        "question_type": "likert_scale",
                        "required": true,
                        "scale_points": 5,
                        "scale_labels": ["Very negative", "Negative", "Neutral", "Positive", "Very positive"]
                    },
                    {
                        "question_id": "Q3",
                        "question_text": format!("What are your thoughts on {}?", parameters.topic),
                        "question_type": "open_ended",
                        "required": false
                    }
                ]
            }]),
        )
}

/// Discussion or interview guide
pub fn guide_schema() -> Schema {
    Schema::object(Some("Discussion guide"))
        .field("title", Schema::string(None))
        .field("objectives", string_list())
        .field("topics", string_list().with_min_items(1))
}

pub fn guide_hints(parameters: &RunParameters) -> SeedHints {
    SeedHints::new()
        .set("title", json!(format!("{} Discussion Guide (Fallback)", parameters.topic)))
        .set("objectives", json!([parameters.objectives.clone()]))
        .set(
            "topics",
            json!([
                format!("General impressions of {}", parameters.topic),
                "Recent experiences",
                "Expectations and concerns"
            ]),
        )
}

/// Survey answers: a JSON array of `{question_id, response}`
pub fn answers_schema() -> Schema {
    Schema::array(
        Some("Survey answers"),
        Schema::object(None)
            .field("question_id", Schema::string(None))
            .field("response", Schema::any(Some("string, list of strings or null"))),
    )
}

/// Analysis block: narrative figures the aggregator reconciles
pub fn analysis_schema() -> Schema {
    Schema::object(Some("Analysis"))
        .field("summary", Schema::string(None))
        .field("themes", string_list())
        .field(
            "sentiment",
            Schema::object(None)
                .field("positive", Schema::number(None))
                .field("neutral", Schema::number(None))
                .field("negative", Schema::number(None)),
        )
        .optional_field("key_findings", string_list())
        .optional_field("entity_sentiment", Schema::object(None))
        .optional_field("engagement", Schema::object(None))
}

/// Seed for a fallback analysis block carrying the configured sentiment default
pub fn analysis_hints(sentiment: SentimentTriple, reason: &str) -> SeedHints {
    SeedHints::new()
        .set("summary", json!(format!("Analysis unavailable: {}", reason)))
        .set("sentiment", sentiment.to_value())
}

/// Flatten a questionnaire's questions in section order
pub fn questions(questionnaire: &Value) -> Vec<&Value> {
    questionnaire
        .get("sections")
        .and_then(Value::as_array)
        .map(|sections| {
            sections
                .iter()
                .filter_map(|s| s.get("questions").and_then(Value::as_array))
                .flatten()
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelsim_core::SimulationKind;
    use panelsim_structured::synthesize;

    fn params() -> RunParameters {
        RunParameters {
            kind: SimulationKind::Survey,
            topic: "Meal kits".to_string(),
            objectives: "Gauge interest".to_string(),
            target_audience: "Busy parents".to_string(),
            entity_count: 4,
            round_count: 0,
        }
    }

    #[test]
    fn test_fallback_entity_is_schema_valid_and_deterministic() {
        let schema = entity_schema();
        let first = synthesize(&schema, &entity_hints("R", 2));
        let second = synthesize(&schema, &entity_hints("R", 2));

        assert!(first.degraded);
        assert_eq!(first, second);
        assert!(schema.validate(&first.value).is_ok());
        assert_eq!(first.value["entity_id"], "R003_fallback");
        assert_eq!(first.value["name"], "Fallback Persona 3");
        assert_eq!(first.value["demographics"]["age"], 18 + 21);
        assert_eq!(first.value["demographics"]["income_annual_usd"], 50_000);
        assert_eq!(first.value["attitudes"]["sentiment_towards_topic"], "Neutral");
        assert_eq!(first.value["psychographics"]["values"], json!([]));
        assert_eq!(first.value["behaviors"]["decision_making_style"], "N/A");
    }

    #[test]
    fn test_fallback_questionnaire_is_valid() {
        let schema = questionnaire_schema();
        let fallback = synthesize(&schema, &questionnaire_hints(&params()));
        assert!(schema.validate(&fallback.value).is_ok());
        assert_eq!(fallback.value["survey_title"], "Meal kits Survey (Fallback)");
        assert_eq!(questions(&fallback.value).len(), 3);
    }

    #[test]
    fn test_fallback_guide_and_analysis_are_valid() {
        let guide = synthesize(&guide_schema(), &guide_hints(&params()));
        assert!(guide_schema().validate(&guide.value).is_ok());

        let analysis = synthesize(
            &analysis_schema(),
            &analysis_hints(SentimentTriple::new(0.5, 0.3, 0.2), "timeout"),
        );
        assert!(analysis_schema().validate(&analysis.value).is_ok());
        assert_eq!(analysis.value["sentiment"]["positive"], 0.5);
        assert!(analysis.value["summary"].as_str().unwrap().contains("timeout"));
    }

    #[test]
    fn test_entity_id_numbering() {
        assert_eq!(entity_id("R", 0), "R001");
        assert_eq!(entity_id("P", 11), "P012");
    }
}
