//! Scripted Generation Client
//!
//! Deterministic backend for tests and demos. Responses are configured per
//! role kind; failures can be injected for prompts containing a marker
//! (for example an entity id) on the first N matching calls or on every
//! call. Every prompt is recorded so tests can assert on causal ordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use panelsim_core::{RoleKind, RoleSpec};

use super::client::GenerationClient;
use super::types::{LlmError, LlmResult};

type Responder = Arc<dyn Fn(&RoleSpec, &str) -> String + Send + Sync>;

/// Failure class injected by a scripted rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// Simulated rate limit (retryable)
    Transient,
    /// Simulated invalid request (not retryable)
    Fatal,
    /// Succeeds, but with text that contains no structured block
    Malformed,
}

impl ScriptedFailure {
    fn into_result(self) -> LlmResult<String> {
        match self {
            ScriptedFailure::Transient => Err(LlmError::RateLimited {
                message: "scripted transient failure".to_string(),
                retry_after: None,
            }),
            ScriptedFailure::Fatal => Err(LlmError::InvalidRequest {
                message: "scripted fatal failure".to_string(),
            }),
            ScriptedFailure::Malformed => {
                Ok("I'd rather just chat about it, no JSON today.".to_string())
            }
        }
    }
}

struct FailureRule {
    kind: RoleKind,
    marker: String,
    /// `None` fails every matching call
    remaining: Option<u32>,
    failure: ScriptedFailure,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub kind: RoleKind,
    pub role_name: String,
    pub prompt: String,
}

/// Scripted `GenerationClient`.
#[derive(Default)]
pub struct ScriptedClient {
    responders: HashMap<RoleKind, Responder>,
    rules: Mutex<Vec<FailureRule>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `kind` with `text`.
    pub fn respond(self, kind: RoleKind, text: impl Into<String>) -> Self {
        let text = text.into();
        self.respond_with(kind, move |_, _| text.clone())
    }

    /// Answer `kind` by calling `f(role, prompt)`.
    pub fn respond_with<F>(mut self, kind: RoleKind, f: F) -> Self
    where
        F: Fn(&RoleSpec, &str) -> String + Send + Sync + 'static,
    {
        self.responders.insert(kind, Arc::new(f));
        self
    }

    /// Fail the first `times` calls for `kind` whose prompt contains `marker`.
    pub fn fail_first(
        self,
        kind: RoleKind,
        marker: impl Into<String>,
        times: u32,
        failure: ScriptedFailure,
    ) -> Self {
        self.push_rule(kind, marker.into(), Some(times), failure)
    }

    /// Fail every call for `kind` whose prompt contains `marker`.
    pub fn fail_always(
        self,
        kind: RoleKind,
        marker: impl Into<String>,
        failure: ScriptedFailure,
    ) -> Self {
        self.push_rule(kind, marker.into(), None, failure)
    }

    /// Sleep for `delay` inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push_rule(
        self,
        kind: RoleKind,
        marker: String,
        remaining: Option<u32>,
        failure: ScriptedFailure,
    ) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(FailureRule {
                kind,
                marker,
                remaining,
                failure,
            });
        }
        self
    }

    /// Every call made so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Prompts sent on behalf of `kind`, in arrival order.
    pub fn prompts_for(&self, kind: RoleKind) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.prompt)
            .collect()
    }

    /// Number of calls whose prompt contains `marker`.
    pub fn calls_matching(&self, kind: RoleKind, marker: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.kind == kind && c.prompt.contains(marker))
            .count()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Highest number of calls observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn injected_failure(&self, kind: RoleKind, prompt: &str) -> Option<ScriptedFailure> {
        let mut rules = self.rules.lock().ok()?;
        for rule in rules.iter_mut() {
            if rule.kind != kind || !prompt.contains(&rule.marker) {
                continue;
            }
            match rule.remaining.as_mut() {
                None => return Some(rule.failure),
                Some(0) => continue,
                Some(n) => {
                    *n -= 1;
                    return Some(rule.failure);
                }
            }
        }
        None
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, role: &RoleSpec, prompt: &str) -> LlmResult<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                kind: role.kind(),
                role_name: role.name().to_string(),
                prompt: prompt.to_string(),
            });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(failure) = self.injected_failure(role.kind(), prompt) {
            return failure.into_result();
        }

        match self.responders.get(&role.kind()) {
            Some(responder) => Ok(responder(role, prompt)),
            None => Err(LlmError::Other {
                message: format!("no scripted response for role {}", role.kind()),
            }),
        }
    }
}
