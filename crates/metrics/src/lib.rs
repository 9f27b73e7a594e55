//! Panelsim Metrics
//!
//! Recomputes objective metrics directly from raw artifacts and reconciles
//! them with the figures a model reported in its analysis block. Anything
//! mechanically derivable from raw text is always taken from the raw text.
//!
//! - `models` - metric value types (`SentimentTriple`, `FinalMetrics`, ...)
//! - `sentiment` - triple parsing, consistency check and normalization
//! - `transcript` - word counts, engagement, markers, question types
//! - `demographics` - population summary from entity profiles
//! - `reconcile` - the aggregator entry point

pub mod demographics;
pub mod models;
pub mod reconcile;
pub mod sentiment;
pub mod transcript;

pub use demographics::summarize_demographics;
pub use models::{
    DemographicSummary, Discrepancy, FinalMetrics, MetricsError, NumericSummary,
    QuestionType, QuestionTypeCounts, ResponseMetrics, SentimentDefault, SentimentPreset,
    SentimentTriple, SpeakerEngagement,
};
pub use reconcile::{reconcile, RawArtifacts, ReconcileOptions};
pub use sentiment::{normalize, parse_triple};
pub use transcript::{
    classify_question, engagement_by_speaker, hesitation_count, question_type_counts,
    response_metrics, unique_words, word_count,
};
