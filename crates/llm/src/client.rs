//! Generation Client
//!
//! The role-aware interface the pipeline uses to talk to a backend, and the
//! adapter that puts an `LlmProvider` behind it with a per-call deadline and
//! run-level cancellation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use panelsim_core::RoleSpec;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::provider::LlmProvider;
use super::types::{LlmError, LlmRequestOptions, LlmResult, Message};

/// Default per-call deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Text generation on behalf of a role.
///
/// Implementations keep no conversational state between calls; anything a
/// call depends on (such as a growing transcript) must be in `prompt`.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, role: &RoleSpec, prompt: &str) -> LlmResult<String>;
}

#[async_trait]
impl<T: GenerationClient + ?Sized> GenerationClient for Arc<T> {
    async fn generate(&self, role: &RoleSpec, prompt: &str) -> LlmResult<String> {
        (**self).generate(role, prompt).await
    }
}

/// `GenerationClient` backed by an `LlmProvider`.
///
/// The role's instructions are sent as the system prompt and `prompt` as
/// the single user message. Each call is bounded by `call_timeout` and
/// raced against the cancellation token.
pub struct ProviderClient {
    provider: Arc<dyn LlmProvider>,
    call_timeout: Duration,
    cancel: CancellationToken,
    options: LlmRequestOptions,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cancel: CancellationToken::new(),
            options: LlmRequestOptions::default(),
        }
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_options(mut self, options: LlmRequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }
}

#[async_trait]
impl GenerationClient for ProviderClient {
    async fn generate(&self, role: &RoleSpec, prompt: &str) -> LlmResult<String> {
        if self.cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let call = self.provider.send_message(
            vec![Message::user(prompt)],
            Some(role.instructions().to_string()),
            self.options.clone(),
        );

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(LlmError::Cancelled),
            result = tokio::time::timeout(self.call_timeout, call) => match result {
                Ok(response) => response?,
                Err(_) => {
                    warn!(
                        role = %role.kind(),
                        timeout_secs = self.call_timeout.as_secs(),
                        "generation call timed out"
                    );
                    return Err(LlmError::Timeout {
                        seconds: self.call_timeout.as_secs(),
                    });
                }
            }
        };

        match response.content {
            Some(text) if !text.trim().is_empty() => {
                debug!(role = %role.kind(), chars = text.len(), "generation call returned");
                Ok(text)
            }
            _ => Err(LlmError::ParseError {
                message: format!(
                    "response contained no text content (model: {}, stop_reason: {:?})",
                    response.model, response.stop_reason
                ),
            }),
        }
    }
}
