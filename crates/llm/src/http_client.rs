//! HTTP Client Factory

use std::time::Duration;

use super::types::{LlmError, LlmResult};

/// Connection establishment deadline. The full request deadline is enforced
/// per call by `ProviderClient`.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a `reqwest::Client` for provider traffic.
pub fn build_http_client() -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| LlmError::ProviderUnavailable {
            message: format!("failed to build HTTP client: {}", e),
        })
}
