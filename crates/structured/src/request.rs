//! Structured Requests
//!
//! The generate → extract → retry → fallback chain used at every call site
//! that needs structured output, plus its free-text counterpart used for
//! transcript turns. Item-level failures always resolve to a degraded value;
//! only cancellation is returned as an error.

use panelsim_core::{PipelineEvent, RoleSpec};
use panelsim_llm::{GenerationClient, LlmError};
use tracing::warn;

use crate::error::{ExtractionError, StructuredError};
use crate::extract::{extract, StructuredObject};
use crate::fallback::{synthesize, SeedHints};
use crate::retry::RetryPolicy;
use crate::schema::Schema;

/// Outcome of a structured request.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub object: StructuredObject,
    /// Response text the object was extracted from (absent when degraded)
    pub raw: Option<String>,
    pub attempts: u32,
    /// Final error when the object was synthesized
    pub error: Option<String>,
}

impl Resolved {
    pub fn is_degraded(&self) -> bool {
        self.object.degraded
    }
}

/// Outcome of a free-text request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutcome {
    pub text: String,
    pub degraded: bool,
    pub attempts: u32,
    pub error: Option<String>,
}

/// Re-ask prompt used after an extraction failure.
pub fn build_repair_prompt(original_prompt: &str, error: &ExtractionError) -> String {
    format!(
        "{}\n\n---\nYour previous response could not be used.\n\
         Problem: {}\n\
         Respond again. Put the structured data in a single ```json fenced block \
         that matches the requested shape exactly, with every required field present \
         and numbers written as numbers.",
        original_prompt, error
    )
}

/// Generate, extract and validate; retry per `policy`; fall back to a
/// synthesized object built from `hints` when attempts run out or a fatal
/// backend error occurs.
pub async fn request_structured(
    client: &dyn GenerationClient,
    policy: &RetryPolicy,
    label: &str,
    role: &RoleSpec,
    prompt: &str,
    schema: &Schema,
    hints: &SeedHints,
) -> Result<Resolved, StructuredError> {
    let outcome = policy
        .run(
            label,
            |attempt| async move {
                let prompt = match &attempt.last_error {
                    Some(StructuredError::Extraction(e)) => build_repair_prompt(prompt, e),
                    _ => prompt.to_string(),
                };
                let raw = client.generate(role, &prompt).await?;
                let value = extract(&raw, schema)?;
                Ok::<_, StructuredError>((value, raw))
            },
            StructuredError::is_retryable,
        )
        .await;

    match outcome.result {
        Ok((value, raw)) => Ok(Resolved {
            object: StructuredObject::parsed(value),
            raw: Some(raw),
            attempts: outcome.attempts,
            error: None,
        }),
        Err(e) if e.is_cancelled() || policy.cancellation().is_cancelled() => {
            Err(StructuredError::Backend(LlmError::Cancelled))
        }
        Err(e) => {
            warn!(label, attempts = outcome.attempts, error = %e, "substituting fallback object");
            policy
                .events()
                .emit(PipelineEvent::ItemDegraded {
                    label: label.to_string(),
                    reason: e.to_string(),
                })
                .await;
            Ok(Resolved {
                object: synthesize(schema, hints),
                raw: None,
                attempts: outcome.attempts,
                error: Some(e.to_string()),
            })
        }
    }
}

/// Generate free text; empty responses count as malformed. Falls back to
/// `placeholder` (degraded) when attempts run out.
pub async fn request_text(
    client: &dyn GenerationClient,
    policy: &RetryPolicy,
    label: &str,
    role: &RoleSpec,
    prompt: &str,
    placeholder: &str,
) -> Result<TextOutcome, StructuredError> {
    let outcome = policy
        .run(
            label,
            |_attempt| async move {
                let text = client.generate(role, prompt).await?;
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(StructuredError::Extraction(ExtractionError::parse(
                        "empty response",
                        &text,
                    )));
                }
                Ok(trimmed.to_string())
            },
            StructuredError::is_retryable,
        )
        .await;

    match outcome.result {
        Ok(text) => Ok(TextOutcome {
            text,
            degraded: false,
            attempts: outcome.attempts,
            error: None,
        }),
        Err(e) if e.is_cancelled() || policy.cancellation().is_cancelled() => {
            Err(StructuredError::Backend(LlmError::Cancelled))
        }
        Err(e) => {
            warn!(label, attempts = outcome.attempts, error = %e, "substituting placeholder text");
            policy
                .events()
                .emit(PipelineEvent::ItemDegraded {
                    label: label.to_string(),
                    reason: e.to_string(),
                })
                .await;
            Ok(TextOutcome {
                text: placeholder.to_string(),
                degraded: true,
                attempts: outcome.attempts,
                error: Some(e.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;
    use panelsim_core::RoleKind;
    use panelsim_llm::{ScriptedClient, ScriptedFailure};
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn schema() -> Schema {
        Schema::object(None)
            .field("entity_id", Schema::string(None))
            .field("age", Schema::number(None))
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Backoff::new(Duration::from_millis(10), Duration::from_millis(40), 2.0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let client = ScriptedClient::new().respond(
            RoleKind::EntityGenerator,
            "```json\n{\"entity_id\": \"R001\", \"age\": 30}\n```",
        );
        let role = RoleSpec::entity_generator("g");
        let resolved = request_structured(&client, &policy(), "R001", &role, "make R001", &schema(), &SeedHints::new())
            .await
            .unwrap();
        assert!(!resolved.is_degraded());
        assert_eq!(resolved.attempts, 1);
        assert_eq!(resolved.object.value, json!({"entity_id": "R001", "age": 30}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_output_retries_with_repair_prompt_then_degrades() {
        let client = ScriptedClient::new()
            .respond(RoleKind::EntityGenerator, "{}")
            .fail_always(RoleKind::EntityGenerator, "make", ScriptedFailure::Malformed);
        let role = RoleSpec::entity_generator("g");
        let hints = SeedHints::new().set("entity_id", json!("R005_fallback"));

        let resolved = request_structured(&client, &policy(), "R005", &role, "make R005", &schema(), &hints)
            .await
            .unwrap();

        assert!(resolved.is_degraded());
        assert_eq!(resolved.attempts, 3);
        assert_eq!(resolved.object.value["entity_id"], "R005_fallback");
        assert!(schema().validate(&resolved.object.value).is_ok());
        assert!(resolved.error.unwrap().contains("No structured block"));

        let prompts = client.prompts_for(RoleKind::EntityGenerator);
        assert_eq!(prompts.len(), 3);
        assert!(!prompts[0].contains("could not be used"));
        assert!(prompts[1].contains("could not be used"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_backend_error_degrades_without_retry() {
        let client = ScriptedClient::new()
            .respond(RoleKind::EntityGenerator, "{}")
            .fail_always(RoleKind::EntityGenerator, "R002", ScriptedFailure::Fatal);
        let role = RoleSpec::entity_generator("g");
        let resolved = request_structured(&client, &policy(), "R002", &role, "R002", &schema(), &SeedHints::new())
            .await
            .unwrap();
        assert!(resolved.is_degraded());
        assert_eq!(resolved.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_returned() {
        let token = CancellationToken::new();
        token.cancel();
        let client = ScriptedClient::new()
            .fail_always(RoleKind::EntityGenerator, "", ScriptedFailure::Transient);
        let role = RoleSpec::entity_generator("g");
        let result = request_structured(
            &client,
            &policy().with_cancellation(token),
            "R001",
            &role,
            "R001",
            &schema(),
            &SeedHints::new(),
        )
        .await;
        assert!(matches!(result, Err(e) if e.is_cancelled()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_text_placeholder() {
        let client = ScriptedClient::new()
            .respond(RoleKind::Analyst, "   ")
            .respond(RoleKind::Designer, "  hello  ");
        let outcome = request_text(&client, &policy(), "turn 3", &RoleSpec::analyst("a"), "p", "[no response]")
            .await
            .unwrap();
        assert!(outcome.degraded);
        assert_eq!(outcome.text, "[no response]");
        assert_eq!(outcome.attempts, 3);

        let outcome = request_text(&client, &policy(), "turn 4", &RoleSpec::designer("d"), "p", "[no response]")
            .await
            .unwrap();
        assert!(!outcome.degraded);
        assert_eq!(outcome.text, "hello");
    }
}
