//! Recomputed metrics override what the analyst reports

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use panelsim::services::pipeline::artifacts::AnalyzedArtifact;
use panelsim::{ArtifactStore, PanelsimConfig};
use panelsim_core::{InteractorRole, RoleKind, SimulationKind, StageName};
use panelsim_llm::{ScriptedClient, ScriptedFailure};
use panelsim_metrics::{SentimentDefault, SentimentPreset, SentimentTriple};
use serde_json::json;

use super::helpers::{conversation_client, fast_config, fenced, params, run_with};

const TEN_WORDS: &str = "one two three four five six seven eight nine ten";
const FIFTEEN_WORDS: &str =
    "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen";

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn assert_close(actual: SentimentTriple, expected: SentimentTriple) {
    assert!(
        (actual.positive - expected.positive).abs() < 1e-6
            && (actual.neutral - expected.neutral).abs() < 1e-6
            && (actual.negative - expected.negative).abs() < 1e-6,
        "{:?} != {:?}",
        actual,
        expected
    );
}

async fn analyzed(store: &dyn ArtifactStore, run_id: &str) -> AnalyzedArtifact {
    serde_json::from_value(
        store
            .read_artifact(run_id, StageName::Analyze)
            .await
            .unwrap()
            .unwrap(),
    )
    .unwrap()
}

/// One participant answering ten words, then fifteen
fn counted_client() -> ScriptedClient {
    let answers = Arc::new(AtomicUsize::new(0));
    conversation_client().respond_with(
        RoleKind::Interactor(InteractorRole::Participant),
        move |_, _| {
            let text = match answers.fetch_add(1, Ordering::SeqCst) {
                0 => TEN_WORDS,
                _ => FIFTEEN_WORDS,
            };
            text.to_string()
        },
    )
}

#[tokio::test]
async fn test_inflated_analyst_figures_are_recomputed() {
    let inflated = format!(
        "Everyone loved it.\n\n{}",
        fenced(&json!({
            "summary": "Universal enthusiasm",
            "themes": ["enthusiasm"],
            "sentiment": {"positive": 0.9, "neutral": 0.9, "negative": 0.9},
            "engagement": {"P001": {"word_count": 400, "response_count": 2}}
        }))
    );
    let client = counted_client().respond(RoleKind::Analyst, inflated);

    let (result, store, _) = run_with(
        client,
        fast_config(),
        "metrics-1",
        params(SimulationKind::FocusGroup, 1, 2),
    )
    .await;
    assert!(result.succeeded(), "run failed: {:?}", result.run.error);

    let metrics = analyzed(&*store, "metrics-1").await.metrics;
    let sentiment = metrics.sentiment.unwrap();
    assert!(approx(sentiment.sum(), 1.0));
    assert!(approx(sentiment.positive, 1.0 / 3.0));

    assert_eq!(metrics.engagement["P001"].word_count, 25);
    assert_eq!(metrics.engagement["P001"].response_count, 2);

    let fields: Vec<&str> = metrics.discrepancies.iter().map(|d| d.field.as_str()).collect();
    assert!(fields.contains(&"sentiment"));
    assert!(fields.contains(&"engagement.P001.word_count"));
    assert!(!fields.contains(&"engagement.P001.response_count"));

    let report = result.report.unwrap();
    assert!(report.contains("### Corrected figures"));
    assert!(report.contains("| `engagement.P001.word_count` | 400 | 25 |"));
    assert!(report.contains("Everyone loved it."));
}

async fn sentiment_with_failed_analyst(default: SentimentDefault, run_id: &str) -> SentimentTriple {
    let mut config: PanelsimConfig = fast_config();
    config.fallback.sentiment_default = default;
    let client = conversation_client().fail_always(RoleKind::Analyst, "", ScriptedFailure::Fatal);

    let (result, store, _) =
        run_with(client, config, run_id, params(SimulationKind::FocusGroup, 2, 1)).await;
    assert!(result.succeeded(), "run failed: {:?}", result.run.error);
    assert_eq!(result.run.stage(StageName::Analyze).degraded_items, 1);

    let analyzed = analyzed(&*store, run_id).await;
    assert!(analyzed.analysis.degraded);
    assert!(analyzed.analysis.narrative.starts_with("Analysis unavailable"));
    for triple in analyzed.metrics.entity_sentiment.values() {
        assert_close(*triple, default.triple());
    }
    analyzed.metrics.sentiment.unwrap()
}

#[tokio::test]
async fn test_failed_analysis_uses_configured_sentiment_default() {
    let skewed = sentiment_with_failed_analyst(
        SentimentDefault::Preset(SentimentPreset::Skewed),
        "metrics-skewed",
    )
    .await;
    assert_close(skewed, SentimentTriple::new(0.5, 0.3, 0.2));

    let even = sentiment_with_failed_analyst(
        SentimentDefault::Preset(SentimentPreset::Even),
        "metrics-even",
    )
    .await;
    assert_close(even, SentimentTriple::new(0.33, 0.34, 0.33));
}
