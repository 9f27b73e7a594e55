//! Fan-out: partial failure, concurrency bound and ordering

use std::time::Duration;

use panelsim::services::pipeline::artifacts::PopulationArtifact;
use panelsim::services::pipeline::schemas::entity_schema;
use panelsim::services::pipeline::{collect_results, FanOutExecutor};
use panelsim::{AppError, ArtifactStore};
use panelsim_core::{RoleKind, SimulationKind, StageName};
use panelsim_llm::ScriptedFailure;
use tokio_util::sync::CancellationToken;

use super::helpers::{fast_config, params, run_with, survey_client};

#[tokio::test]
async fn test_k_of_n_entity_failures_degrade_only_those_items() {
    let client = survey_client()
        .fail_always(
            RoleKind::EntityGenerator,
            "\"entity_id\": \"R002\"",
            ScriptedFailure::Fatal,
        )
        .fail_always(
            RoleKind::EntityGenerator,
            "\"entity_id\": \"R004\"",
            ScriptedFailure::Malformed,
        );

    let (result, store, client) =
        run_with(client, fast_config(), "fan-1", params(SimulationKind::Survey, 5, 1)).await;
    assert!(result.succeeded(), "run failed: {:?}", result.run.error);

    let population: PopulationArtifact = serde_json::from_value(
        store
            .read_artifact("fan-1", StageName::GenerateEntities)
            .await
            .unwrap()
            .unwrap(),
    )
    .unwrap();

    assert_eq!(population.entities.len(), 5);
    let degraded: Vec<usize> = population
        .entities
        .iter()
        .filter(|e| e.degraded)
        .map(|e| e.index)
        .collect();
    assert_eq!(degraded, vec![1, 3]);
    assert_eq!(result.run.stage(StageName::GenerateEntities).degraded_items, 2);

    let schema = entity_schema();
    for entity in &population.entities {
        assert!(schema.validate(&entity.profile).is_ok(), "{} is invalid", entity.entity_id);
    }

    // fatal errors are not retried; malformed output is re-asked until attempts run out
    assert_eq!(client.calls_matching(RoleKind::EntityGenerator, "\"entity_id\": \"R002\""), 1);
    assert_eq!(client.calls_matching(RoleKind::EntityGenerator, "\"entity_id\": \"R004\""), 3);
}

#[tokio::test]
async fn test_in_flight_calls_respect_max_concurrency() {
    let mut config = fast_config();
    config.fan_out.max_concurrency = 2;
    let client = survey_client().with_delay(Duration::from_millis(20));

    let (result, _, client) =
        run_with(client, config, "fan-2", params(SimulationKind::Survey, 6, 1)).await;

    assert!(result.succeeded());
    assert!(client.max_in_flight() <= 2, "saw {} in flight", client.max_in_flight());
    assert!(client.max_in_flight() >= 1);
}

#[tokio::test]
async fn test_cancellation_mid_fan_out_stops_waiting_items() {
    let cancel = CancellationToken::new();
    let executor = FanOutExecutor::new(1).with_cancellation(cancel.clone());
    let trigger = cancel.clone();

    let results = executor
        .run("cancel", vec![0usize, 1, 2], |index, _| {
            let trigger = trigger.clone();
            async move {
                if index == 0 {
                    trigger.cancel();
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Ok(index)
            }
        })
        .await;

    let outcome = collect_results(results);
    assert!(matches!(outcome, Err(AppError::Cancelled)));
    assert!(cancel.is_cancelled());
}
