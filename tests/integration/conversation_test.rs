//! Focus group and interview turn-taking

use panelsim::services::pipeline::artifacts::{AnalyzedArtifact, Collected, CollectionArtifact};
use panelsim::ArtifactStore;
use panelsim_core::{InteractionRecord, InteractorRole, RoleKind, SimulationKind, StageName};
use panelsim_llm::ScriptedFailure;

use super::helpers::{conversation_client, fast_config, params, run_with};

async fn transcript_of(store: &dyn ArtifactStore, run_id: &str) -> InteractionRecord {
    let collection: CollectionArtifact = serde_json::from_value(
        store
            .read_artifact(run_id, StageName::CollectInteractions)
            .await
            .unwrap()
            .unwrap(),
    )
    .unwrap();
    match collection.collected {
        Collected::Conversation { transcript, .. } => transcript,
        Collected::Survey { .. } => panic!("expected a conversation"),
    }
}

#[tokio::test]
async fn test_focus_group_turns_see_earlier_turns() {
    let (result, store, client) = run_with(
        conversation_client(),
        fast_config(),
        "fg-1",
        params(SimulationKind::FocusGroup, 2, 3),
    )
    .await;
    assert!(result.succeeded(), "run failed: {:?}", result.run.error);

    let transcript = transcript_of(&*store, "fg-1").await;
    // opening + 3 rounds of (question + 2 answers) + closing
    assert_eq!(transcript.len(), 1 + 3 * 3 + 1);
    let speakers: Vec<&str> = transcript.turns()[..4].iter().map(|t| t.speaker.as_str()).collect();
    assert_eq!(speakers, vec!["Moderator", "Moderator", "P001", "P002"]);
    let sequences: Vec<usize> = transcript.turns().iter().map(|t| t.sequence).collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));

    // P001's second-round prompt was built after round one and the round-two question
    let prompts = client.prompts_for(RoleKind::Interactor(InteractorRole::Participant));
    assert_eq!(prompts.len(), 6);
    let round_two = &prompts[2];
    let turns = transcript.turns();
    assert!(round_two.contains(&turns[1].content));
    assert!(round_two.contains(&turns[2].content));
    assert!(round_two.contains(&turns[3].content));
    assert!(round_two.contains(&turns[4].content));
    assert!(!round_two.contains(&turns[6].content));
    assert!(round_two.contains("Respond as P001"));
}

#[tokio::test]
async fn test_interview_alternates_speakers() {
    let (result, store, _) = run_with(
        conversation_client(),
        fast_config(),
        "idi-1",
        params(SimulationKind::Interview, 1, 3),
    )
    .await;
    assert!(result.succeeded(), "run failed: {:?}", result.run.error);

    let transcript = transcript_of(&*store, "idi-1").await;
    // introduction, two questions, closing: each followed by an answer
    assert_eq!(transcript.len(), 8);
    for (i, turn) in transcript.turns().iter().enumerate() {
        let expected = if i % 2 == 0 { "Interviewer" } else { "I001" };
        assert_eq!(turn.speaker, expected);
    }

    let report = result.report.unwrap();
    assert!(report.contains("## Transcript"));
    assert!(report.contains("**Interviewer:** Interviewer question 0"));
}

#[tokio::test]
async fn test_failed_turn_is_recorded_and_conversation_continues() {
    let client = conversation_client().fail_always(
        RoleKind::Interactor(InteractorRole::Participant),
        "Respond as P002",
        ScriptedFailure::Fatal,
    );
    let (result, store, _) = run_with(
        client,
        fast_config(),
        "fg-2",
        params(SimulationKind::FocusGroup, 2, 2),
    )
    .await;
    assert!(result.succeeded(), "run failed: {:?}", result.run.error);

    let transcript = transcript_of(&*store, "fg-2").await;
    assert_eq!(transcript.len(), 1 + 2 * 3 + 1);
    assert_eq!(transcript.degraded_turns(), 2);
    for turn in transcript.turns() {
        assert_eq!(turn.degraded, turn.speaker == "P002");
        if turn.degraded {
            assert_eq!(turn.content, "[no response]");
        }
    }
    assert_eq!(result.run.stage(StageName::CollectInteractions).degraded_items, 2);
    assert_eq!(transcript.turns().last().unwrap().speaker, "Moderator");

    // Placeholder turns are not speech
    let analyzed: AnalyzedArtifact = serde_json::from_value(
        store
            .read_artifact("fg-2", StageName::Analyze)
            .await
            .unwrap()
            .unwrap(),
    )
    .unwrap();
    let silent = &analyzed.metrics.engagement["P002"];
    assert_eq!(silent.word_count, 0);
    assert_eq!(silent.response_count, 0);
    assert_eq!(analyzed.metrics.engagement["P001"].response_count, 2);
    assert_eq!(analyzed.metrics.response_metrics.as_ref().unwrap().response_count, 2);
}
