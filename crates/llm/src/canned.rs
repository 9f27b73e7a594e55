//! Canned Client
//!
//! Offline backend that answers every role with deterministic, well-formed
//! content. It reads just enough of the prompt (entity ids, rendered
//! questionnaire blocks) to produce output the pipeline can validate, so a
//! full run can be exercised without network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use async_trait::async_trait;
use panelsim_core::{InteractorRole, RoleKind, RoleSpec};
use regex::Regex;
use serde_json::{json, Value};

use super::client::GenerationClient;
use super::types::LlmResult;

/// Prompt patterns the offline backend understands (compiled once).
struct PromptPatterns {
    entity_id: Regex,
    question_id: Regex,
    question_type: Regex,
    option: Regex,
}

fn patterns() -> Option<&'static PromptPatterns> {
    static PATTERNS: OnceLock<Option<PromptPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(PromptPatterns {
                entity_id: Regex::new(r#""entity_id"\s*:\s*"([^"]+)""#).ok()?,
                question_id: Regex::new(r"Question ID:\*\*\s*`([^`]+)`").ok()?,
                question_type: Regex::new(r"\*\*Type:\*\*\s*(\w+)").ok()?,
                option: Regex::new(r"^\s*-\s*`([^`]+)`").ok()?,
            })
        })
        .as_ref()
}

const HOST_QUESTIONS: [&str; 5] = [
    "What comes to mind first when you think about this topic?",
    "Could you tell me more about a recent experience that shaped your view?",
    "Why do you think others might see it differently?",
    "How does cost factor into your decisions here?",
    "What would need to change for you to feel more positive about it?",
];

const ANSWERS: [&str; 5] = [
    "Honestly, I think it mostly comes down to convenience for me. If it fits my routine I will use it.",
    "Um, I am a bit skeptical. The price is hard to justify when the alternatives work fine.",
    "I had a good experience last month, so I am fairly positive, but I know people who disagree.",
    "Hmm... it depends. I like the idea, but I worry about reliability and support.",
    "For my family it is a clear win. We saved time and the quality has been consistent.",
];

const GENDERS: [&str; 3] = ["Female", "Male", "Non-binary"];
const CITIES: [&str; 4] = ["Austin, TX", "Columbus, OH", "Portland, OR", "Raleigh, NC"];
const OCCUPATIONS: [&str; 4] = ["Teacher", "Nurse", "Software Developer", "Retail Manager"];

/// Offline `GenerationClient` with deterministic responses per role.
#[derive(Debug, Default)]
pub struct CannedClient {
    counter: AtomicUsize,
}

impl CannedClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    fn design(&self, prompt: &str) -> String {
        let doc = if prompt.contains("\"sections\"") {
            json!({
                "survey_title": "Consumer Attitudes Survey",
                "survey_introduction": "Thank you for taking part. This survey takes about five minutes.",
                "sections": [{
                    "section_title": "Background",
                    "questions": [
                        {"question_id": "Q1", "question_text": "How often do you use this kind of product?",
                         "question_type": "multiple_choice", "required": true,
                         "options": ["Daily", "Weekly", "Monthly", "Rarely"]},
                        {"question_id": "Q2", "question_text": "Which features matter to you?",
                         "question_type": "checkbox", "required": false,
                         "options": ["Price", "Quality", "Convenience", "Brand"]}
                    ]
                }, {
                    "section_title": "Opinions",
                    "questions": [
                        {"question_id": "Q3", "question_text": "How satisfied are you overall?",
                         "question_type": "likert_scale", "required": true, "scale_points": 5,
                         "scale_labels": ["Very dissatisfied", "Dissatisfied", "Neutral", "Satisfied", "Very satisfied"]},
                        {"question_id": "Q4", "question_text": "Rank these factors by importance.",
                         "question_type": "ranking", "required": false,
                         "options": ["Price", "Quality", "Convenience"]},
                        {"question_id": "Q5", "question_text": "Anything else you would like to share?",
                         "question_type": "open_ended", "required": false}
                    ]
                }]
            })
        } else {
            json!({
                "title": "Discussion Guide",
                "objectives": ["Understand current habits", "Surface barriers to adoption"],
                "topics": ["First impressions", "Recent experiences", "Cost and value", "Future expectations"]
            })
        };
        fenced(&doc)
    }

    fn entity(&self, prompt: &str) -> String {
        let id = patterns()
            .and_then(|p| p.entity_id.captures(prompt))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| format!("E{:03}", self.next() + 1));
        let seed: usize = id
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .unwrap_or(0);

        let profile = json!({
            "entity_id": id,
            "name": format!("Persona {}", seed),
            "demographics": {
                "age": 22 + (seed * 9) % 45,
                "gender": GENDERS[seed % GENDERS.len()],
                "location": CITIES[seed % CITIES.len()],
                "occupation": OCCUPATIONS[seed % OCCUPATIONS.len()],
                "income_annual_usd": 40_000 + (seed % 6) * 12_500
            },
            "psychographics": {
                "personality_traits": ["Curious", "Practical"],
                "values": ["Family", "Value for money"],
                "interests": ["Cooking", "Travel"]
            },
            "behaviors": {
                "decision_making_style": "Analytical",
                "shopping_preferences": ["Online", "Compares reviews"]
            },
            "attitudes": {
                "sentiment_towards_topic": if seed % 2 == 0 { "Positive" } else { "Mixed" },
                "opinions": "Sees potential but wants proof of reliability."
            },
            "response_style": {
                "approach": "Thoughtful"
            }
        });
        fenced(&profile)
    }

    fn survey_answers(&self, prompt: &str) -> String {
        let mut answers: Vec<Value> = Vec::new();
        let mut current: Option<(String, String, Vec<String>)> = None;

        let flush = |q: Option<(String, String, Vec<String>)>, answers: &mut Vec<Value>| {
            if let Some((id, kind, options)) = q {
                let response = match kind.as_str() {
                    "checkbox" => json!(options.iter().take(2).collect::<Vec<_>>()),
                    "ranking" => json!(options),
                    "open_ended" => json!(ANSWERS[answers.len() % ANSWERS.len()]),
                    _ => options
                        .get(options.len() / 2)
                        .map(|o| json!(o))
                        .unwrap_or_else(|| json!("Neutral")),
                };
                answers.push(json!({"question_id": id, "response": response}));
            }
        };

        let Some(patterns) = patterns() else {
            return fenced(&Value::Array(answers));
        };
        for line in prompt.lines() {
            if let Some(id) = patterns.question_id.captures(line).and_then(|c| c.get(1)) {
                flush(current.take(), &mut answers);
                current = Some((id.as_str().to_string(), String::new(), Vec::new()));
            } else if let Some(kind) = patterns.question_type.captures(line).and_then(|c| c.get(1)) {
                if let Some(q) = current.as_mut() {
                    q.1 = kind.as_str().to_string();
                }
            } else if let Some(option) = patterns.option.captures(line).and_then(|c| c.get(1)) {
                if let Some(q) = current.as_mut() {
                    q.2.push(option.as_str().to_string());
                }
            }
        }
        flush(current.take(), &mut answers);

        fenced(&Value::Array(answers))
    }

    fn analysis(&self) -> String {
        let block = json!({
            "summary": "Participants were broadly positive but cost remains the main barrier.",
            "themes": ["Convenience", "Cost sensitivity", "Reliability concerns"],
            "sentiment": {"positive": 0.5, "neutral": 0.3, "negative": 0.2},
            "key_findings": [
                "Convenience is the strongest driver of adoption",
                "Price objections cluster among lower-income respondents"
            ]
        });
        format!(
            "Overall the sessions showed cautious optimism. Most people valued convenience, \
             while a minority raised concerns about price and reliability.\n\n{}",
            fenced(&block)
        )
    }
}

fn fenced(value: &Value) -> String {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{}\n```", body)
}

#[async_trait]
impl GenerationClient for CannedClient {
    async fn generate(&self, role: &RoleSpec, prompt: &str) -> LlmResult<String> {
        let text = match role.kind() {
            RoleKind::Designer => self.design(prompt),
            RoleKind::EntityGenerator => self.entity(prompt),
            RoleKind::Analyst => self.analysis(),
            RoleKind::Interactor(InteractorRole::Moderator | InteractorRole::Interviewer) => {
                HOST_QUESTIONS[self.next() % HOST_QUESTIONS.len()].to_string()
            }
            RoleKind::Interactor(_) if prompt.contains("Question ID:**") => {
                self.survey_answers(prompt)
            }
            RoleKind::Interactor(_) => ANSWERS[self.next() % ANSWERS.len()].to_string(),
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_block(text: &str) -> Value {
        let start = text.find("```json").unwrap() + 7;
        let end = text[start..].find("```").unwrap() + start;
        serde_json::from_str(text[start..end].trim()).unwrap()
    }

    #[tokio::test]
    async fn test_dispatches_on_role_behind_generation_client() {
        let client: std::sync::Arc<dyn GenerationClient> = std::sync::Arc::new(CannedClient::new());
        let host = client
            .generate(&RoleSpec::interactor(InteractorRole::Moderator, "Moderator", "m"), "")
            .await
            .unwrap();
        assert!(HOST_QUESTIONS.contains(&host.as_str()));

        let reply = client
            .generate(&RoleSpec::interactor(InteractorRole::Participant, "P001", "p"), "")
            .await
            .unwrap();
        assert!(ANSWERS.contains(&reply.as_str()));
    }

    #[tokio::test]
    async fn test_entity_uses_requested_id() {
        let canned = CannedClient::new();
        let text = canned
            .generate(
                &RoleSpec::entity_generator("g"),
                r#"Use "entity_id": "R004" for this respondent."#,
            )
            .await
            .unwrap();
        let profile = json_block(&text);
        assert_eq!(profile["entity_id"], "R004");
        assert!(profile["demographics"]["age"].is_number());
    }

    #[tokio::test]
    async fn test_survey_answers_follow_rendered_questions() {
        let canned = CannedClient::new();
        let prompt = "**Question ID:** `Q1` (Required)\n**Type:** multiple_choice\n**Text:** How often?\n**Options:**\n- `Daily`\n- `Weekly`\n- `Rarely`\n\n**Question ID:** `Q2` (Optional)\n**Type:** open_ended\n**Text:** Thoughts?\n";
        let role = RoleSpec::interactor(InteractorRole::Respondent, "R001", "r");
        let answers = json_block(&canned.generate(&role, prompt).await.unwrap());
        let answers = answers.as_array().unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0]["question_id"], "Q1");
        assert_eq!(answers[0]["response"], "Weekly");
        assert!(answers[1]["response"].is_string());
    }

    #[tokio::test]
    async fn test_designer_shapes() {
        let canned = CannedClient::new();
        let survey = json_block(
            &canned
                .generate(&RoleSpec::designer("d"), r#"Return {"sections": [...]}"#)
                .await
                .unwrap(),
        );
        assert_eq!(survey["sections"].as_array().unwrap().len(), 2);

        let guide = json_block(
            &canned
                .generate(&RoleSpec::designer("d"), "discussion guide please")
                .await
                .unwrap(),
        );
        assert!(guide["topics"].is_array());
    }

    #[tokio::test]
    async fn test_analysis_has_narrative_and_block() {
        let canned = CannedClient::new();
        let text = canned.generate(&RoleSpec::analyst("a"), "").await.unwrap();
        assert!(text.starts_with("Overall"));
        assert_eq!(json_block(&text)["sentiment"]["positive"], 0.5);
    }
}
