//! Integration Tests Module
//!
//! End-to-end pipeline runs against scripted and canned backends: survey,
//! focus group and interview flows, fan-out degradation, metrics
//! reconciliation, structured extraction, storage backends and run failure.

mod helpers;

// Survey pipeline runs
mod survey_pipeline_test;

// Focus group and interview turn-taking
mod conversation_test;

// Bounded fan-out and partial failure
mod fanout_test;

// Metrics aggregation and sentiment defaults
mod metrics_test;

// Extraction, retry and fallback
mod structured_test;

// Filesystem and SQLite stores, config loading
mod storage_test;

// Stage failure, cancellation and events
mod failure_test;
