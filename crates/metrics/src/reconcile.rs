//! Metrics reconciliation
//!
//! Builds [`FinalMetrics`] from the raw artifacts of a run and the analysis
//! block the model produced. Recomputed numbers always win; disagreements are
//! recorded as [`Discrepancy`] entries and missing fields as substitutions.

use std::collections::BTreeMap;

use panelsim_core::{EntityProfile, InteractionRecord};
use serde::Serialize;
use serde_json::Value;

use crate::demographics::summarize_demographics;
use crate::models::{
    Discrepancy, FinalMetrics, QuestionTypeCounts, ResponseMetrics, SentimentDefault,
    SentimentTriple, SpeakerEngagement,
};
use crate::sentiment::{is_consistent, normalize, parse_triple};
use crate::transcript::{engagement_by_speaker, question_type_counts, response_metrics};

/// Raw inputs the aggregator recomputes from
#[derive(Debug, Clone, Copy)]
pub struct RawArtifacts<'a> {
    pub entities: &'a [EntityProfile],
    /// Conversation turns, or one turn per free-text answer for surveys
    pub transcript: Option<&'a InteractionRecord>,
    /// Speaker label of the moderator or interviewer
    pub host: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOptions {
    pub sentiment_default: SentimentDefault,
    /// Allowed absolute difference for fractional figures such as averages
    pub float_tolerance: f64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            sentiment_default: SentimentDefault::default(),
            float_tolerance: 0.05,
        }
    }
}

struct Reconciler<'r> {
    reported: &'r Value,
    options: &'r ReconcileOptions,
    discrepancies: Vec<Discrepancy>,
    substituted: Vec<String>,
}

impl<'r> Reconciler<'r> {
    fn reported_at(&self, path: &[&str]) -> Option<&'r Value> {
        path.iter()
            .try_fold(self.reported, |value, key| value.get(*key))
            .filter(|v| !v.is_null())
    }

    fn flag(&mut self, field: impl Into<String>, reported: Value, computed: impl Serialize) {
        let field = field.into();
        let computed = serde_json::to_value(computed).unwrap_or(Value::Null);
        tracing::debug!(field = %field, reported = %reported, computed = %computed, "Metric discrepancy");
        self.discrepancies.push(Discrepancy {
            field,
            reported,
            computed,
        });
    }

    fn substitute(&mut self, field: impl Into<String>) {
        self.substituted.push(field.into());
    }

    /// Normalize the triple at `path`, substituting the default when absent
    fn sentiment(&mut self, path: &[&str]) -> SentimentTriple {
        let field = path.join(".");
        let Some(raw) = self.reported_at(path) else {
            self.substitute(field);
            return self.options.sentiment_default.triple();
        };
        let Some(normalized) = parse_triple(raw).and_then(|t| normalize(t).map(|n| (t, n))) else {
            let fallback = self.options.sentiment_default.triple();
            self.flag(field, raw.clone(), fallback);
            return fallback;
        };
        let (reported, normalized) = normalized;
        if !is_consistent(&reported) {
            self.flag(field, raw.clone(), normalized);
        }
        normalized
    }

    /// Compare one integer figure; absent figures are not discrepancies
    fn compare_count(&mut self, field: String, reported: Option<&Value>, computed: usize) {
        let Some(reported) = reported else { return };
        let matches = reported.as_f64().is_some_and(|r| (r - computed as f64).abs() < 0.5);
        if !matches {
            self.flag(field, reported.clone(), computed);
        }
    }

    fn compare_float(&mut self, field: String, reported: Option<&Value>, computed: f64) {
        let Some(reported) = reported else { return };
        let tolerance = self.options.float_tolerance.max(computed.abs() * 0.01);
        let matches = reported.as_f64().is_some_and(|r| (r - computed).abs() <= tolerance);
        if !matches {
            self.flag(field, reported.clone(), computed);
        }
    }

    fn engagement(&mut self, computed: &BTreeMap<String, SpeakerEngagement>) {
        for (speaker, figures) in computed {
            let Some(reported) = self.reported_at(&["engagement", speaker.as_str()]) else {
                self.substitute(format!("engagement.{speaker}"));
                continue;
            };
            let prefix = format!("engagement.{speaker}");
            self.compare_count(format!("{prefix}.word_count"), reported.get("word_count"), figures.word_count);
            self.compare_count(
                format!("{prefix}.response_count"),
                reported.get("response_count"),
                figures.response_count,
            );
            self.compare_count(
                format!("{prefix}.interaction_score"),
                reported.get("interaction_score"),
                figures.interaction_score,
            );
        }
    }

    fn response_metrics(&mut self, computed: &ResponseMetrics) {
        let Some(reported) = self.reported_at(&["response_metrics"]) else {
            self.substitute("response_metrics");
            return;
        };
        self.compare_count(
            "response_metrics.total_word_count".into(),
            reported.get("total_word_count"),
            computed.total_word_count,
        );
        self.compare_float(
            "response_metrics.avg_response_length".into(),
            reported.get("avg_response_length"),
            computed.avg_response_length,
        );
        self.compare_count(
            "response_metrics.unique_words".into(),
            reported.get("unique_words"),
            computed.unique_words,
        );
        self.compare_count(
            "response_metrics.hesitation_count".into(),
            reported.get("hesitation_count"),
            computed.hesitation_count,
        );
    }

    fn question_types(&mut self, computed: &QuestionTypeCounts) {
        let Some(reported) = self.reported_at(&["question_types"]) else {
            self.substitute("question_types");
            return;
        };
        self.compare_count("question_types.open_ended".into(), reported.get("open_ended"), computed.open_ended);
        self.compare_count("question_types.closed".into(), reported.get("closed"), computed.closed);
        self.compare_count("question_types.probing".into(), reported.get("probing"), computed.probing);
    }
}

/// Recompute objective metrics and reconcile them with `reported`.
///
/// `reported` is the structured block of the analysis artifact, or
/// `Value::Null` when analysis produced nothing usable.
pub fn reconcile(reported: &Value, raw: RawArtifacts<'_>, options: &ReconcileOptions) -> FinalMetrics {
    let mut reconciler = Reconciler {
        reported,
        options,
        discrepancies: Vec::new(),
        substituted: Vec::new(),
    };

    let sentiment = reconciler.sentiment(&["sentiment"]);

    let mut entity_sentiment = BTreeMap::new();
    for entity in raw.entities {
        let triple = reconciler.sentiment(&["entity_sentiment", entity.entity_id.as_str()]);
        entity_sentiment.insert(entity.entity_id.clone(), triple);
    }

    let mut engagement = BTreeMap::new();
    let mut responses = None;
    let mut question_types = None;
    if let Some(transcript) = raw.transcript {
        engagement = engagement_by_speaker(transcript);
        reconciler.engagement(&engagement);

        responses = response_metrics(transcript, raw.host);
        if let Some(computed) = &responses {
            reconciler.response_metrics(computed);
        }

        if let Some(host) = raw.host {
            let counts = question_type_counts(transcript, host);
            reconciler.question_types(&counts);
            question_types = Some(counts);
        }
    }

    let demographics = (!raw.entities.is_empty()).then(|| summarize_demographics(raw.entities));

    let themes = match reconciler.reported_at(&["themes"]) {
        Some(Value::Array(items)) => items.clone(),
        _ => {
            reconciler.substitute("themes");
            Vec::new()
        }
    };

    let Reconciler {
        discrepancies,
        substituted,
        ..
    } = reconciler;

    tracing::info!(
        discrepancies = discrepancies.len(),
        substituted = substituted.len(),
        "Metrics reconciled"
    );

    FinalMetrics {
        sentiment: Some(sentiment),
        entity_sentiment,
        engagement,
        response_metrics: responses,
        question_types,
        demographics,
        themes,
        discrepancies,
        substituted,
    }
}
