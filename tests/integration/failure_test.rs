//! Stage failure, cancellation and event ordering

use std::sync::Arc;

use panelsim::{ArtifactStore, InMemoryArtifactStore, PipelineController};
use panelsim_core::{
    EventSink, InteractorRole, PipelineEvent, RoleKind, RunStatus, SimulationKind, StageName,
    StageStatus,
};
use tokio_util::sync::CancellationToken;

use super::helpers::{
    answers_json, conversation_client, fast_config, fenced, params, survey_client,
};

#[tokio::test]
async fn test_persist_failure_stops_the_run() {
    let store = Arc::new(InMemoryArtifactStore::failing_on(StageName::CollectInteractions));
    let client = Arc::new(survey_client());
    let controller = PipelineController::new(store.clone(), client.clone(), fast_config());

    let result = controller
        .run("fail-1", params(SimulationKind::Survey, 2, 1))
        .await
        .unwrap();

    assert_eq!(result.run.status, RunStatus::Failed);
    assert!(result.report.is_none());
    assert!(result.run.error.as_deref().unwrap().contains("collect_interactions"));

    assert_eq!(
        store.list_stages("fail-1").await.unwrap(),
        vec![StageName::Design, StageName::GenerateEntities]
    );
    let manifest = store.read_manifest("fail-1").await.unwrap().unwrap();
    assert_eq!(manifest.status, RunStatus::Failed);
    assert_eq!(manifest.stage(StageName::Design).status, StageStatus::Succeeded);
    assert_eq!(manifest.stage(StageName::CollectInteractions).status, StageStatus::Failed);
    assert_eq!(manifest.stage(StageName::Process).status, StageStatus::Pending);
    assert_eq!(manifest.stage(StageName::Report).status, StageStatus::Pending);
    assert!(store.read_report("fail-1").await.unwrap().is_none());

    // no analysis was attempted after the failure
    assert!(client.prompts_for(RoleKind::Analyst).is_empty());
}

#[tokio::test]
async fn test_cancellation_during_collection() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let client = survey_client().respond_with(
        RoleKind::Interactor(InteractorRole::Respondent),
        move |_, _| {
            trigger.cancel();
            fenced(&answers_json())
        },
    );

    let store = Arc::new(InMemoryArtifactStore::new());
    let client = Arc::new(client);
    let controller = PipelineController::new(store.clone(), client.clone(), fast_config())
        .with_cancellation(cancel);

    let result = controller
        .run("cancel-1", params(SimulationKind::Survey, 3, 1))
        .await
        .unwrap();

    assert_eq!(result.run.status, RunStatus::Cancelled);
    assert!(result.report.is_none());
    assert_ne!(result.run.stage(StageName::Report).status, StageStatus::Succeeded);
    assert!(client.prompts_for(RoleKind::Analyst).is_empty());

    let manifest = store.read_manifest("cancel-1").await.unwrap().unwrap();
    assert_eq!(manifest.status, RunStatus::Cancelled);
    assert!(store.read_report("cancel-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_events_follow_stage_order() {
    let (events, mut rx) = EventSink::channel(512);
    let store = Arc::new(InMemoryArtifactStore::new());
    let controller =
        PipelineController::new(store, Arc::new(conversation_client()), fast_config())
            .with_events(events);

    let result = controller
        .run("events-1", params(SimulationKind::FocusGroup, 2, 1))
        .await
        .unwrap();
    assert!(result.succeeded());
    drop(controller);

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }

    assert!(matches!(received.first(), Some(PipelineEvent::RunStarted { .. })));
    assert!(matches!(
        received.last(),
        Some(PipelineEvent::RunFinished {
            status: RunStatus::Succeeded,
            ..
        })
    ));

    let stage_events: Vec<(StageName, bool)> = received
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::StageStarted { stage, .. } => Some((*stage, true)),
            PipelineEvent::StageCompleted { stage, .. } => Some((*stage, false)),
            _ => None,
        })
        .collect();
    let expected: Vec<(StageName, bool)> = StageName::ALL
        .iter()
        .flat_map(|stage| [(*stage, true), (*stage, false)])
        .collect();
    assert_eq!(stage_events, expected);

    // every turn is announced inside the collection stage, in sequence order
    let collect_start = received
        .iter()
        .position(|e| {
            matches!(e, PipelineEvent::StageStarted { stage: StageName::CollectInteractions, .. })
        })
        .unwrap();
    let collect_end = received
        .iter()
        .position(|e| {
            matches!(e, PipelineEvent::StageCompleted { stage: StageName::CollectInteractions, .. })
        })
        .unwrap();
    let turns: Vec<(usize, usize)> = received
        .iter()
        .enumerate()
        .filter_map(|(position, event)| match event {
            PipelineEvent::TurnAppended { sequence, .. } => Some((position, *sequence)),
            _ => None,
        })
        .collect();
    // opening + question + 2 answers + closing
    assert_eq!(turns.len(), 5);
    for (i, (position, sequence)) in turns.iter().enumerate() {
        assert_eq!(*sequence, i);
        assert!(*position > collect_start && *position < collect_end);
    }
}
