//! Retry Policy
//!
//! An explicit value object wrapped around any fallible async operation:
//! attempt cap, bounded exponential backoff and a caller-supplied
//! retryable-error predicate. After the last attempt the final error is
//! returned (never panics or raises) so the caller can fall back.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use panelsim_core::{EventSink, PipelineEvent};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exponential backoff bounded below by `initial` and above by `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
        }
    }

    /// Delay before retry number `retry` (1 = first retry).
    ///
    /// The sequence is non-decreasing for any multiplier and never exceeds
    /// `max`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let floor = self.initial.min(self.max);
        let multiplier = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            f64::MAX
        };
        let exponent = retry.saturating_sub(1).min(1024) as i32;
        let scaled_nanos = floor.as_nanos() as f64 * multiplier.powi(exponent);
        if scaled_nanos.is_finite() && scaled_nanos < self.max.as_nanos() as f64 {
            Duration::from_nanos(scaled_nanos.round() as u64).max(floor)
        } else {
            self.max
        }
    }

    /// Delays between `attempts` attempts (one fewer than attempts).
    pub fn schedule(&self, attempts: u32) -> Vec<Duration> {
        (1..attempts).map(|retry| self.delay_for(retry)).collect()
    }
}

/// Context handed to each attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt<E> {
    /// 1-based attempt number
    pub number: u32,
    /// The previous attempt's error, if any
    pub last_error: Option<E>,
}

/// Result of running an operation under a `RetryPolicy`.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Attempts actually made
    pub attempts: u32,
    /// Backoff delays actually waited, in order
    pub delays: Vec<Duration>,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    events: EventSink,
    cancel: CancellationToken,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Backoff::default())
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            events: EventSink::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Backoff sleeps end early when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is reached.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        label: &str,
        mut operation: F,
        is_retryable: P,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(Attempt<E>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display + Clone,
    {
        let mut delays = Vec::new();
        let mut last_error: Option<E> = None;
        let mut number = 1;

        loop {
            let attempt = Attempt {
                number,
                last_error: last_error.take(),
            };
            let error = match operation(attempt).await {
                Ok(value) => {
                    if number > 1 {
                        debug!(label, attempt = number, "operation succeeded after retry");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: number,
                        delays,
                    };
                }
                Err(e) => e,
            };

            if !is_retryable(&error) || number >= self.max_attempts || self.cancel.is_cancelled() {
                if number >= self.max_attempts && is_retryable(&error) {
                    warn!(label, attempts = number, error = %error, "retries exhausted");
                }
                return RetryOutcome {
                    result: Err(error),
                    attempts: number,
                    delays,
                };
            }

            let delay = self.backoff.delay_for(number);
            warn!(
                label,
                attempt = number,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retryable failure, backing off"
            );
            self.events
                .emit(PipelineEvent::RetryScheduled {
                    label: label.to_string(),
                    attempt: number,
                    delay_ms: delay.as_millis() as u64,
                    reason: error.to_string(),
                })
                .await;

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return RetryOutcome {
                        result: Err(error),
                        attempts: number,
                        delays,
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }

            delays.push(delay);
            last_error = Some(error);
            number += 1;
        }
    }
}
