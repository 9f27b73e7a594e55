//! Stage Context
//!
//! Run-scoped collaborators handed to every stage: the generation client,
//! retry policy, fan-out executor, event sink and cancellation token.

use std::sync::Arc;

use panelsim_core::{EventSink, RoleSpec, RunParameters};
use panelsim_llm::GenerationClient;
use panelsim_metrics::SentimentDefault;
use panelsim_structured::{
    request_structured, request_text, Resolved, RetryPolicy, Schema, SeedHints, StructuredError,
    TextOutcome,
};
use tokio_util::sync::CancellationToken;

use super::fanout::FanOutExecutor;
use crate::models::PanelsimConfig;
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct StageContext {
    pub run_id: String,
    pub parameters: RunParameters,
    pub client: Arc<dyn GenerationClient>,
    pub policy: RetryPolicy,
    pub fan_out: FanOutExecutor,
    pub events: EventSink,
    pub cancel: CancellationToken,
    pub sentiment_default: SentimentDefault,
}

fn into_app_error(error: StructuredError) -> AppError {
    if error.is_cancelled() {
        AppError::Cancelled
    } else {
        AppError::fatal(error.to_string())
    }
}

impl StageContext {
    /// Wire the retry policy and fan-out executor to the run's event sink and
    /// cancellation token.
    pub fn new(
        run_id: impl Into<String>,
        parameters: RunParameters,
        client: Arc<dyn GenerationClient>,
        settings: &PanelsimConfig,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        let policy = settings
            .retry
            .policy()
            .with_events(events.clone())
            .with_cancellation(cancel.clone());
        let fan_out =
            FanOutExecutor::new(settings.fan_out.max_concurrency).with_cancellation(cancel.clone());
        Self {
            run_id: run_id.into(),
            parameters,
            client,
            policy,
            fan_out,
            events,
            cancel,
            sentiment_default: settings.fallback.sentiment_default,
        }
    }

    pub fn check_cancelled(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Structured request with retry and fallback. Only cancellation fails.
    pub async fn structured(
        &self,
        label: &str,
        role: &RoleSpec,
        prompt: &str,
        schema: &Schema,
        hints: &SeedHints,
    ) -> AppResult<Resolved> {
        self.check_cancelled()?;
        request_structured(self.client.as_ref(), &self.policy, label, role, prompt, schema, hints)
            .await
            .map_err(into_app_error)
    }

    /// Free-text request with retry and a placeholder fallback.
    pub async fn text(
        &self,
        label: &str,
        role: &RoleSpec,
        prompt: &str,
        placeholder: &str,
    ) -> AppResult<TextOutcome> {
        self.check_cancelled()?;
        request_text(self.client.as_ref(), &self.policy, label, role, prompt, placeholder)
            .await
            .map_err(into_app_error)
    }
}
