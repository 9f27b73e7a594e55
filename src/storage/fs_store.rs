//! Filesystem Artifact Store
//!
//! Layout: `<root>/<run_id>/<stage>.json`, `<root>/<run_id>/run.json` and
//! `<root>/<run_id>/report.md`. Files are written to a temporary sibling and
//! renamed into place so a crash never leaves a half-written artifact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use panelsim_core::{Run, StageName};
use serde_json::Value;

use super::artifact_store::{validate_run_id, ArtifactStore};
use crate::utils::error::{AppError, AppResult};

const MANIFEST_FILE: &str = "run.json";
const REPORT_FILE: &str = "report.md";

pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every file of one run
    pub fn run_dir(&self, run_id: &str) -> AppResult<PathBuf> {
        validate_run_id(run_id)?;
        Ok(self.root.join(run_id))
    }

    fn stage_path(&self, run_id: &str, stage: StageName) -> AppResult<PathBuf> {
        Ok(self.run_dir(run_id)?.join(format!("{}.json", stage.as_str())))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            AppError::storage(format!("Failed to move {} into place: {}", path.display(), e))
        })?;
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> AppResult<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn write_artifact(&self, run_id: &str, stage: StageName, artifact: &Value) -> AppResult<()> {
        let path = self.stage_path(run_id, stage)?;
        let content = serde_json::to_vec_pretty(artifact)?;
        self.write_file(&path, &content).await?;
        tracing::debug!(run_id, stage = %stage, path = %path.display(), "Artifact written");
        Ok(())
    }

    async fn read_artifact(&self, run_id: &str, stage: StageName) -> AppResult<Option<Value>> {
        let path = self.stage_path(run_id, stage)?;
        match self.read_file(&path).await? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    async fn list_stages(&self, run_id: &str) -> AppResult<Vec<StageName>> {
        let mut stages = Vec::new();
        for stage in StageName::ALL {
            if tokio::fs::try_exists(self.stage_path(run_id, stage)?).await? {
                stages.push(stage);
            }
        }
        Ok(stages)
    }

    async fn write_manifest(&self, run: &Run) -> AppResult<()> {
        let path = self.run_dir(&run.id)?.join(MANIFEST_FILE);
        let content = serde_json::to_vec_pretty(run)?;
        self.write_file(&path, &content).await
    }

    async fn read_manifest(&self, run_id: &str) -> AppResult<Option<Run>> {
        let path = self.run_dir(run_id)?.join(MANIFEST_FILE);
        match self.read_file(&path).await? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    async fn write_report(&self, run_id: &str, markdown: &str) -> AppResult<()> {
        let path = self.run_dir(run_id)?.join(REPORT_FILE);
        self.write_file(&path, markdown.as_bytes()).await
    }

    async fn read_report(&self, run_id: &str) -> AppResult<Option<String>> {
        let path = self.run_dir(run_id)?.join(REPORT_FILE);
        self.read_file(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fs_store_layout() {
        let temp = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(temp.path());

        store
            .write_artifact("run-1", StageName::GenerateEntities, &json!([{"entity_id": "R001"}]))
            .await
            .unwrap();
        store.write_report("run-1", "# Report").await.unwrap();

        let dir = temp.path().join("run-1");
        assert!(dir.join("generate_entities.json").is_file());
        assert!(dir.join("report.md").is_file());
        assert!(!dir.join("generate_entities.tmp").exists());

        assert_eq!(
            store.list_stages("run-1").await.unwrap(),
            vec![StageName::GenerateEntities]
        );
        assert_eq!(
            store
                .read_artifact("run-1", StageName::GenerateEntities)
                .await
                .unwrap()
                .unwrap()[0]["entity_id"],
            "R001"
        );
        assert_eq!(store.read_report("run-1").await.unwrap().unwrap(), "# Report");
    }

    #[tokio::test]
    async fn test_fs_store_missing_and_invalid() {
        let temp = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(temp.path());

        assert!(store.read_artifact("nope", StageName::Design).await.unwrap().is_none());
        assert!(store.read_manifest("nope").await.unwrap().is_none());
        assert!(store.list_stages("nope").await.unwrap().is_empty());
        assert!(store
            .write_artifact("../escape", StageName::Design, &json!({}))
            .await
            .is_err());
    }
}
