//! Panelsim Structured Output
//!
//! Turns unreliable text-generation calls into schema-valid objects:
//!
//! - `schema` - required-field schema model and validation
//! - `extract` - two-phase extraction (locate a block, then parse and validate)
//! - `retry` - `RetryPolicy` with bounded exponential backoff
//! - `fallback` - deterministic Fallback Synthesizer producing degraded objects
//! - `request` - the generate → extract → retry → fallback combinator
//! - `error` - `ExtractionError` / `StructuredError`

pub mod error;
pub mod extract;
pub mod fallback;
pub mod request;
pub mod retry;
pub mod schema;

pub use error::{ExtractionError, StructuredError};
pub use extract::{extract, locate_block, split_narrative, StructuredObject};
pub use fallback::{synthesize, SeedHints};
pub use request::{build_repair_prompt, request_structured, request_text, Resolved, TextOutcome};
pub use retry::{Attempt, Backoff, RetryOutcome, RetryPolicy};
pub use schema::{Schema, SchemaType, SchemaViolation};
