//! SQLite Artifact Store
//!
//! Artifact storage in a single SQLite database. Uses r2d2 connection pooling
//! and runs every query on the blocking thread pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use panelsim_core::{Run, StageName};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::Value;

use super::artifact_store::{validate_run_id, ArtifactStore};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_dir;

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

pub struct SqliteArtifactStore {
    pool: Arc<DbPool>,
}

impl SqliteArtifactStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| AppError::storage(format!("Failed to create connection pool: {}", e)))?;
        Self::new(Arc::new(pool))
    }

    /// In-memory database for testing
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::storage(format!("Failed to create connection pool: {}", e)))?;
        Self::new(Arc::new(pool))
    }

    /// Wrap an existing pool, creating the tables if they do not exist.
    pub fn new(pool: Arc<DbPool>) -> AppResult<Self> {
        let conn = pool
            .get()
            .map_err(|e| AppError::storage(format!("Failed to get connection: {}", e)))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stage_artifacts (
                run_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                stage_index INTEGER NOT NULL,
                artifact TEXT NOT NULL,
                written_at TEXT NOT NULL,
                PRIMARY KEY (run_id, stage)
            );
            CREATE TABLE IF NOT EXISTS run_manifests (
                run_id TEXT PRIMARY KEY,
                manifest TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS run_reports (
                run_id TEXT PRIMARY KEY,
                markdown TEXT NOT NULL
            );",
        )?;

        Ok(Self { pool })
    }

    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> AppResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| AppError::storage(format!("Failed to get connection: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| AppError::storage(format!("Task join error: {}", e)))?
    }

    async fn read_text(&self, sql: &'static str, run_id: &str) -> AppResult<Option<String>> {
        let rid = run_id.to_string();
        self.with_conn(move |conn| {
            match conn.query_row(sql, rusqlite::params![rid], |row| row.get::<_, String>(0)) {
                Ok(text) => Ok(Some(text)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn write_artifact(&self, run_id: &str, stage: StageName, artifact: &Value) -> AppResult<()> {
        validate_run_id(run_id)?;
        let rid = run_id.to_string();
        let json = serde_json::to_string(artifact)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO stage_artifacts
                 (run_id, stage, stage_index, artifact, written_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    rid,
                    stage.as_str(),
                    stage.index() as i64,
                    json,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn read_artifact(&self, run_id: &str, stage: StageName) -> AppResult<Option<Value>> {
        let rid = run_id.to_string();
        let text = self
            .with_conn(move |conn| {
                match conn.query_row(
                    "SELECT artifact FROM stage_artifacts WHERE run_id = ?1 AND stage = ?2",
                    rusqlite::params![rid, stage.as_str()],
                    |row| row.get::<_, String>(0),
                ) {
                    Ok(text) => Ok(Some(text)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        text.map(|t| serde_json::from_str(&t).map_err(AppError::from))
            .transpose()
    }

    async fn list_stages(&self, run_id: &str) -> AppResult<Vec<StageName>> {
        let rid = run_id.to_string();
        let names: Vec<String> = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT stage FROM stage_artifacts WHERE run_id = ?1 ORDER BY stage_index",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![rid], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        names
            .iter()
            .map(|n| {
                n.parse::<StageName>()
                    .map_err(|e| AppError::storage(format!("Corrupt stage name {:?}: {}", n, e)))
            })
            .collect()
    }

    async fn write_manifest(&self, run: &Run) -> AppResult<()> {
        validate_run_id(&run.id)?;
        let rid = run.id.clone();
        let json = serde_json::to_string(run)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO run_manifests (run_id, manifest, updated_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![rid, json, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn read_manifest(&self, run_id: &str) -> AppResult<Option<Run>> {
        let text = self
            .read_text("SELECT manifest FROM run_manifests WHERE run_id = ?1", run_id)
            .await?;
        text.map(|t| serde_json::from_str(&t).map_err(AppError::from))
            .transpose()
    }

    async fn write_report(&self, run_id: &str, markdown: &str) -> AppResult<()> {
        validate_run_id(run_id)?;
        let rid = run_id.to_string();
        let markdown = markdown.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO run_reports (run_id, markdown) VALUES (?1, ?2)",
                rusqlite::params![rid, markdown],
            )?;
            Ok(())
        })
        .await
    }

    async fn read_report(&self, run_id: &str) -> AppResult<Option<String>> {
        self.read_text("SELECT markdown FROM run_reports WHERE run_id = ?1", run_id)
            .await
    }
}
