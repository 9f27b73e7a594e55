//! Settings Models
//!
//! Run configuration loaded from `config.toml`. Every section and field has a
//! default, so an empty file is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use panelsim_llm::{ProviderConfig, ProviderType};
use panelsim_metrics::SentimentDefault;
use panelsim_structured::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Environment variable consulted when `[provider].api_key` is absent
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelsimConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub fan_out: FanOutSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub fallback: FallbackSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetrySettings {
    /// Build the retry policy these settings describe
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Backoff::new(
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_millis(self.max_backoff_ms),
                self.multiplier,
            ),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutSettings {
    /// Maximum number of generation calls in flight per fan-out
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_call_timeout_secs() -> u64 {
    120
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl TimeoutSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackSettings {
    /// `"even"`, `"skewed"` or an explicit `{ positive, neutral, negative }` table
    #[serde(default)]
    pub sentiment_default: SentimentDefault,
}

/// Artifact store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Fs,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Defaults to `~/.panelsim/runs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl PanelsimConfig {
    /// Fill the API key from the environment when the file leaves it out
    pub fn apply_env(&mut self) {
        if self.provider.api_key.is_none() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                if !key.trim().is_empty() {
                    self.provider.api_key = Some(key);
                }
            }
        }
    }

    /// Whether runs should use the offline canned backend
    pub fn is_offline(&self) -> bool {
        self.provider.provider == ProviderType::Canned
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            ));
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err("retry.multiplier must be a finite number >= 1.0".to_string());
        }
        if self.fan_out.max_concurrency == 0 {
            return Err("fan_out.max_concurrency must be at least 1".to_string());
        }
        if self.timeouts.call_timeout_secs == 0 {
            return Err("timeouts.call_timeout_secs must be at least 1".to_string());
        }
        self.fallback
            .sentiment_default
            .validate()
            .map_err(|e| format!("fallback.sentiment_default: {}", e))?;
        Ok(())
    }
}
