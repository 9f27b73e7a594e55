//! Concurrent Fan-Out Executor
//!
//! Runs one operation per item concurrently, bounded by a semaphore, and
//! returns the results in input order. Per-item operations are expected to
//! absorb their own failures into degraded records; the only errors that
//! come back are run-level ones such as cancellation.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct FanOutExecutor {
    max_concurrency: usize,
    cancel: CancellationToken,
}

impl FanOutExecutor {
    /// `max_concurrency` is clamped to at least one.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Dispatch `per_item(index, item)` for every item.
    ///
    /// The returned vector has one entry per item and `result[i]` always
    /// belongs to `items[i]`, whatever order the operations finish in.
    pub async fn run<T, R, F, Fut>(&self, label: &str, items: Vec<T>, per_item: F) -> Vec<AppResult<R>>
    where
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = AppResult<R>>,
    {
        let total = items.len();
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        debug!(label, items = total, max_concurrency = self.max_concurrency, "Fan-out started");

        let per_item = &per_item;
        let tasks = items.into_iter().enumerate().map(|(index, item)| {
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();
            async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                    permit = semaphore.acquire_owned() => permit
                        .map_err(|e| AppError::internal(format!("Fan-out semaphore closed: {}", e)))?,
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(AppError::Cancelled),
                    result = per_item(index, item) => result,
                }
            }
        });

        let results = join_all(tasks).await;
        info!(
            label,
            items = total,
            failed = results.iter().filter(|r| r.is_err()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fan-out finished"
        );
        results
    }
}

/// Unwrap fan-out results, surfacing the first run-level error.
/// Cancellation takes precedence over other errors.
pub fn collect_results<R>(results: Vec<AppResult<R>>) -> AppResult<Vec<R>> {
    if results.iter().any(|r| matches!(r, Err(AppError::Cancelled))) {
        return Err(AppError::Cancelled);
    }
    results.into_iter().collect()
}
