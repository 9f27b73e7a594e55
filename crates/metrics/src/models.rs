//! Metrics Models
//!
//! Value types produced by the aggregator and the error raised for invalid
//! sentiment configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while configuring metric computation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("Invalid sentiment triple: {0}")]
    InvalidTriple(String),
}

// ============================================================================
// Sentiment
// ============================================================================

/// Positive / neutral / negative shares; normalized triples sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentTriple {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl SentimentTriple {
    pub const fn new(positive: f64, neutral: f64, negative: f64) -> Self {
        Self {
            positive,
            neutral,
            negative,
        }
    }

    pub fn sum(&self) -> f64 {
        self.positive + self.neutral + self.negative
    }

    pub fn has_negative_component(&self) -> bool {
        self.positive < 0.0 || self.neutral < 0.0 || self.negative < 0.0
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "positive": self.positive,
            "neutral": self.neutral,
            "negative": self.negative,
        })
    }
}

/// Named default sentiment distributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentPreset {
    /// 0.33 / 0.34 / 0.33
    Even,
    /// 0.5 / 0.3 / 0.2
    Skewed,
}

/// Distribution substituted when a model omits a sentiment breakdown.
///
/// Configured either as a preset name (`"even"`, `"skewed"`) or as an
/// explicit `{ positive, neutral, negative }` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SentimentDefault {
    Preset(SentimentPreset),
    Explicit(SentimentTriple),
}

impl Default for SentimentDefault {
    fn default() -> Self {
        SentimentDefault::Preset(SentimentPreset::Even)
    }
}

impl SentimentDefault {
    /// Check that an explicit triple can be normalized
    pub fn validate(&self) -> Result<(), MetricsError> {
        if let SentimentDefault::Explicit(triple) = self {
            if triple.has_negative_component() {
                return Err(MetricsError::InvalidTriple(
                    "components must not be negative".to_string(),
                ));
            }
            if triple.sum() <= 0.0 {
                return Err(MetricsError::InvalidTriple(
                    "components must not all be zero".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The normalized triple this default stands for
    pub fn triple(&self) -> SentimentTriple {
        match self {
            SentimentDefault::Preset(SentimentPreset::Even) => SentimentTriple::new(0.33, 0.34, 0.33),
            SentimentDefault::Preset(SentimentPreset::Skewed) => SentimentTriple::new(0.5, 0.3, 0.2),
            SentimentDefault::Explicit(triple) => crate::sentiment::normalize(*triple)
                .unwrap_or(SentimentTriple::new(0.33, 0.34, 0.33)),
        }
    }
}

// ============================================================================
// Transcript metrics
// ============================================================================

/// Per-speaker engagement derived from transcript turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpeakerEngagement {
    pub word_count: usize,
    pub response_count: usize,
    /// `min(10, word_count / 100)`
    pub interaction_score: usize,
}

/// Aggregate response figures for the non-host speakers of a transcript
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseMetrics {
    pub total_word_count: usize,
    pub response_count: usize,
    pub avg_response_length: f64,
    pub unique_words: usize,
    pub hesitation_count: usize,
}

/// Classification of a host question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    OpenEnded,
    Closed,
    Probing,
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionType::OpenEnded => write!(f, "open_ended"),
            QuestionType::Closed => write!(f, "closed"),
            QuestionType::Probing => write!(f, "probing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionTypeCounts {
    pub open_ended: usize,
    pub closed: usize,
    pub probing: usize,
}

impl QuestionTypeCounts {
    pub fn record(&mut self, question_type: QuestionType) {
        match question_type {
            QuestionType::OpenEnded => self.open_ended += 1,
            QuestionType::Closed => self.closed += 1,
            QuestionType::Probing => self.probing += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.open_ended + self.closed + self.probing
    }
}

// ============================================================================
// Demographics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Population summary over generated entity profiles
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DemographicSummary {
    pub entity_count: usize,
    pub degraded_profiles: usize,
    pub age: Option<NumericSummary>,
    pub income: Option<NumericSummary>,
    pub gender_distribution: BTreeMap<String, usize>,
}

// ============================================================================
// Reconciliation output
// ============================================================================

/// A model-reported figure that disagreed with the recomputed one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Dotted path of the field, e.g. `engagement.R001.word_count`
    pub field: String,
    pub reported: Value,
    pub computed: Value,
}

/// Final metrics: recomputed figures plus the model's qualitative output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinalMetrics {
    pub sentiment: Option<SentimentTriple>,
    /// One normalized triple per entity id of the run
    pub entity_sentiment: BTreeMap<String, SentimentTriple>,
    pub engagement: BTreeMap<String, SpeakerEngagement>,
    pub response_metrics: Option<ResponseMetrics>,
    pub question_types: Option<QuestionTypeCounts>,
    pub demographics: Option<DemographicSummary>,
    pub themes: Vec<Value>,
    pub discrepancies: Vec<Discrepancy>,
    /// Fields the model omitted and the aggregator filled in
    pub substituted: Vec<String>,
}

impl FinalMetrics {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
