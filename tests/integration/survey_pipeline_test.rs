//! End-to-end survey runs against a scripted backend

use panelsim::services::pipeline::artifacts::{CollectionArtifact, ProcessedArtifact};
use panelsim::services::pipeline::artifacts::{Collected, ProcessedData};
use panelsim::ArtifactStore;
use panelsim_core::{RoleKind, SimulationKind, StageName, StageStatus};
use panelsim_llm::ScriptedFailure;

use super::helpers::{fast_config, params, run_with, survey_client};

#[tokio::test]
async fn test_survey_run_recovers_from_transient_failure() {
    let client = survey_client().fail_first(
        RoleKind::EntityGenerator,
        "\"entity_id\": \"R003\"",
        1,
        ScriptedFailure::Transient,
    );

    let (result, store, client) =
        run_with(client, fast_config(), "survey-1", params(SimulationKind::Survey, 4, 1)).await;

    assert!(result.succeeded(), "run failed: {:?}", result.run.error);
    assert_eq!(
        client.calls_matching(RoleKind::EntityGenerator, "\"entity_id\": \"R003\""),
        2
    );
    assert_eq!(result.run.stage(StageName::GenerateEntities).degraded_items, 0);
    assert_eq!(store.list_stages("survey-1").await.unwrap(), StageName::ALL.to_vec());
    assert!(store.read_report("survey-1").await.unwrap().is_some());

    let collection: CollectionArtifact = serde_json::from_value(
        store
            .read_artifact("survey-1", StageName::CollectInteractions)
            .await
            .unwrap()
            .unwrap(),
    )
    .unwrap();
    let ids: Vec<&str> = collection.entities.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["R001", "R002", "R003", "R004"]);
    assert!(collection.entities.iter().all(|e| !e.degraded));
}

#[tokio::test]
async fn test_survey_aggregates_every_question() {
    let (result, store, _) = run_with(
        survey_client(),
        fast_config(),
        "survey-2",
        params(SimulationKind::Survey, 3, 1),
    )
    .await;
    assert!(result.succeeded());

    let processed: ProcessedArtifact = serde_json::from_value(
        store
            .read_artifact("survey-2", StageName::Process)
            .await
            .unwrap()
            .unwrap(),
    )
    .unwrap();
    let ProcessedData::Survey(summary) = processed.processed else {
        panic!("expected survey data");
    };
    assert_eq!(summary.question_order, vec!["Q1", "Q2", "Q3", "Q4", "Q5"]);
    assert_eq!(summary.survey_metadata.num_respondents_processed, 3);
    assert!(summary.survey_metadata.respondent_error_counts.is_empty());
    assert_eq!(summary.questions_aggregated["Q1"].responses.len(), 3);

    let report = result.report.unwrap();
    assert!(report.starts_with("# Meal Kit Survey"));
    assert!(report.contains("- Weekly: 3"));
    assert!(report.contains("- Monthly: 0"));
}

#[tokio::test]
async fn test_degraded_respondent_keeps_run_alive() {
    let client = survey_client().fail_always(
        RoleKind::Interactor(panelsim_core::InteractorRole::Respondent),
        "respondent R002",
        ScriptedFailure::Fatal,
    );

    let (result, store, _) =
        run_with(client, fast_config(), "survey-3", params(SimulationKind::Survey, 3, 1)).await;

    assert!(result.succeeded());
    let collect = result.run.stage(StageName::CollectInteractions);
    assert_eq!(collect.status, StageStatus::Succeeded);
    assert_eq!(collect.degraded_items, 1);

    let collection: CollectionArtifact = serde_json::from_value(
        store
            .read_artifact("survey-3", StageName::CollectInteractions)
            .await
            .unwrap()
            .unwrap(),
    )
    .unwrap();
    let Collected::Survey { responses } = collection.collected else {
        panic!("expected survey responses");
    };
    assert_eq!(responses.len(), 3);
    let degraded: Vec<&str> = responses
        .iter()
        .filter(|r| r.degraded)
        .map(|r| r.respondent_id.as_str())
        .collect();
    assert_eq!(degraded, vec!["R002"]);
    assert!(responses[1].answers.iter().all(|a| a["response"].is_null()));
}
