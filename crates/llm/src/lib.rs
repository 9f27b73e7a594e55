//! Panelsim LLM
//!
//! Generation client layer for panelsim:
//! - `LlmProvider` trait and the OpenAI-compatible HTTP provider (OpenAI,
//!   DeepSeek, Ollama's `/v1` endpoint)
//! - `GenerationClient`, the role-aware interface the pipeline talks to
//! - `ProviderClient`, which adds per-call timeouts and run cancellation
//! - `CannedClient` for offline runs and `ScriptedClient` for tests
//!
//! Errors are classified into transient (retryable) and fatal via
//! `LlmError::is_transient`.

pub mod canned;
pub mod client;
pub mod http_client;
pub mod openai;
pub mod provider;
pub mod scripted;
pub mod types;

// Re-export main types
pub use canned::CannedClient;
pub use client::{GenerationClient, ProviderClient};
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::{create_provider, LlmProvider};
pub use scripted::{ScriptedClient, ScriptedFailure};
pub use types::*;
