//! LLM Provider Trait
//!
//! Defines the common interface for HTTP generation backends.

use std::sync::Arc;

use async_trait::async_trait;

use super::openai::OpenAIProvider;
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, ProviderType,
};

/// Trait that all generation backends speaking a chat protocol implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Send a conversation and get a complete response.
    ///
    /// # Arguments
    /// * `messages` - Conversation history
    /// * `system` - Optional system prompt
    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse>;

    /// Get the configuration for this provider.
    fn config(&self) -> &ProviderConfig;
}

/// Create an HTTP provider from a ProviderConfig.
///
/// The canned backend has no HTTP transport and is constructed directly
/// as a `CannedClient`.
pub fn create_provider(config: ProviderConfig) -> LlmResult<Arc<dyn LlmProvider>> {
    match config.provider {
        ProviderType::OpenAI | ProviderType::DeepSeek | ProviderType::Ollama => {
            Ok(Arc::new(OpenAIProvider::new(config)?))
        }
        ProviderType::Canned => Err(LlmError::InvalidRequest {
            message: "canned backend is not an HTTP provider".to_string(),
        }),
    }
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        408 => LlmError::Timeout { seconds: 0 },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => {
            if body.contains("context_length_exceeded") || body.contains("maximum context length")
            {
                LlmError::ContextLengthExceeded {
                    message: body.to_string(),
                    max_tokens: None,
                }
            } else {
                LlmError::InvalidRequest {
                    message: body.to_string(),
                }
            }
        }
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
