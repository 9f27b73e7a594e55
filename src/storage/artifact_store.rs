//! Artifact Store
//!
//! Persistence boundary for run artifacts, keyed by run id and stage name.
//! Used as a durability checkpoint between stages, not as a queryable store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use panelsim_core::{Run, StageName};
use serde_json::Value;

use crate::utils::error::{AppError, AppResult};

/// Durable storage for stage artifacts, run manifests and reports.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &'static str;

    async fn write_artifact(&self, run_id: &str, stage: StageName, artifact: &Value) -> AppResult<()>;

    async fn read_artifact(&self, run_id: &str, stage: StageName) -> AppResult<Option<Value>>;

    /// Stages with a persisted artifact, in pipeline order
    async fn list_stages(&self, run_id: &str) -> AppResult<Vec<StageName>>;

    async fn write_manifest(&self, run: &Run) -> AppResult<()>;

    async fn read_manifest(&self, run_id: &str) -> AppResult<Option<Run>>;

    /// Store the rendered Markdown report
    async fn write_report(&self, run_id: &str, markdown: &str) -> AppResult<()>;

    async fn read_report(&self, run_id: &str) -> AppResult<Option<String>>;
}

/// Reject run ids that cannot be used as a path component or storage key.
pub fn validate_run_id(run_id: &str) -> AppResult<()> {
    let valid = !run_id.is_empty()
        && run_id.len() <= 128
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && run_id != "."
        && run_id != "..";
    if valid {
        Ok(())
    } else {
        Err(AppError::validation(format!("Invalid run id: {:?}", run_id)))
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
struct MemoryState {
    artifacts: HashMap<(String, StageName), Value>,
    writes: HashMap<(String, StageName), usize>,
    manifests: HashMap<String, Run>,
    reports: HashMap<String, String>,
}

/// Process-local store for tests and dry runs.
///
/// Can be told to fail writes for one stage to exercise persistence
/// failures.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    state: Mutex<MemoryState>,
    fail_on: Option<StageName>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write of `stage` fail with a storage error
    pub fn failing_on(stage: StageName) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fail_on: Some(stage),
        }
    }

    /// Number of times an artifact was written for `(run_id, stage)`
    pub fn write_count(&self, run_id: &str, stage: StageName) -> usize {
        self.state
            .lock()
            .map(|s| s.writes.get(&(run_id.to_string(), stage)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| AppError::storage(format!("Store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write_artifact(&self, run_id: &str, stage: StageName, artifact: &Value) -> AppResult<()> {
        if self.fail_on == Some(stage) {
            return Err(AppError::storage(format!("Simulated write failure for {}", stage)));
        }
        let mut state = self.lock()?;
        let key = (run_id.to_string(), stage);
        *state.writes.entry(key.clone()).or_insert(0) += 1;
        state.artifacts.insert(key, artifact.clone());
        Ok(())
    }

    async fn read_artifact(&self, run_id: &str, stage: StageName) -> AppResult<Option<Value>> {
        Ok(self.lock()?.artifacts.get(&(run_id.to_string(), stage)).cloned())
    }

    async fn list_stages(&self, run_id: &str) -> AppResult<Vec<StageName>> {
        let state = self.lock()?;
        Ok(StageName::ALL
            .into_iter()
            .filter(|stage| state.artifacts.contains_key(&(run_id.to_string(), *stage)))
            .collect())
    }

    async fn write_manifest(&self, run: &Run) -> AppResult<()> {
        self.lock()?.manifests.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn read_manifest(&self, run_id: &str) -> AppResult<Option<Run>> {
        Ok(self.lock()?.manifests.get(run_id).cloned())
    }

    async fn write_report(&self, run_id: &str, markdown: &str) -> AppResult<()> {
        self.lock()?.reports.insert(run_id.to_string(), markdown.to_string());
        Ok(())
    }

    async fn read_report(&self, run_id: &str) -> AppResult<Option<String>> {
        Ok(self.lock()?.reports.get(run_id).cloned())
    }
}
