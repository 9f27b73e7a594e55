//! Extraction, retry and fallback through the public structured API

use std::time::Duration;

use panelsim::services::pipeline::schemas::{entity_hints, entity_schema};
use panelsim_core::{EventSink, PipelineEvent, RoleKind, RoleSpec};
use panelsim_llm::{ScriptedClient, ScriptedFailure};
use panelsim_structured::{extract, request_structured, Backoff, RetryPolicy};

use super::helpers::{entity_json, fenced};

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(
        3,
        Backoff::new(Duration::from_millis(1), Duration::from_millis(4), 2.0),
    )
}

#[test]
fn test_extracted_entity_equals_embedded_object() {
    let expected = entity_json("R007");
    let raw = format!(
        "Sure! Here's a persona that fits {{the brief}}.\n\n{}\nLet me know if you need more.",
        fenced(&expected)
    );

    let value = extract(&raw, &entity_schema()).unwrap();
    assert_eq!(value, expected);
}

#[test]
fn test_backoff_schedule_is_non_decreasing_and_bounded() {
    for multiplier in [0.5, 1.0, 1.5, 2.0, 10.0, f64::INFINITY] {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(2), multiplier);
        let schedule = backoff.schedule(12);
        assert_eq!(schedule.len(), 11);
        assert!(schedule.windows(2).all(|w| w[0] <= w[1]), "multiplier {}", multiplier);
        assert!(schedule.iter().all(|d| *d <= Duration::from_secs(2)));
        assert_eq!(schedule[0], Duration::from_millis(100));
    }
}

#[tokio::test]
async fn test_malformed_reply_is_repaired_on_retry() {
    let client = ScriptedClient::new()
        .respond(RoleKind::EntityGenerator, fenced(&entity_json("R001")))
        .fail_first(RoleKind::EntityGenerator, "", 1, ScriptedFailure::Malformed);
    let (events, mut rx) = EventSink::channel(16);
    let policy = fast_policy().with_events(events);
    let role = RoleSpec::entity_generator("Create personas.");

    let resolved = request_structured(
        &client,
        &policy,
        "entity[0]",
        &role,
        "Create persona R001",
        &entity_schema(),
        &entity_hints("R", 0),
    )
    .await
    .unwrap();

    assert!(!resolved.is_degraded());
    assert_eq!(resolved.attempts, 2);
    assert_eq!(resolved.object.value["entity_id"], "R001");

    let prompts = client.prompts_for(RoleKind::EntityGenerator);
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], "Create persona R001");
    assert!(prompts[1].starts_with("Create persona R001"));
    assert!(prompts[1].contains("could not be used"));

    drop(policy);
    let mut retries = 0;
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::RetryScheduled { label, attempt, .. } = event {
            assert_eq!(label, "entity[0]");
            assert_eq!(attempt, 1);
            retries += 1;
        }
    }
    assert_eq!(retries, 1);
}

#[tokio::test]
async fn test_exhausted_request_synthesizes_valid_fallback() {
    let client = ScriptedClient::new().fail_always(
        RoleKind::EntityGenerator,
        "",
        ScriptedFailure::Transient,
    );
    let role = RoleSpec::entity_generator("Create personas.");
    let schema = entity_schema();

    let resolved = request_structured(
        &client,
        &fast_policy(),
        "entity[4]",
        &role,
        "Create persona R005",
        &schema,
        &entity_hints("R", 4),
    )
    .await
    .unwrap();

    assert!(resolved.is_degraded());
    assert_eq!(resolved.attempts, 3);
    assert!(resolved.error.is_some());
    assert!(schema.validate(&resolved.object.value).is_ok());
    assert_eq!(resolved.object.value["entity_id"], "R005_fallback");
    assert_eq!(resolved.object.value["name"], "Fallback Persona 5");
}
