//! Offline runs persisted to the filesystem and SQLite stores

use std::io::Write;
use std::sync::Arc;

use panelsim::storage::{load_config, open_store, DATABASE_FILE};
use panelsim::{ArtifactStore, FsArtifactStore, PipelineController, SqliteArtifactStore, StorageBackend};
use panelsim_core::{RunStatus, SimulationKind, StageName};
use panelsim_llm::CannedClient;
use tempfile::TempDir;

use super::helpers::{fast_config, params};

#[tokio::test]
async fn test_fs_store_lays_out_one_file_per_stage() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsArtifactStore::new(dir.path()));
    let controller = PipelineController::new(store, Arc::new(CannedClient::new()), fast_config());

    let result = controller
        .run("fs-run", params(SimulationKind::Survey, 3, 1))
        .await
        .unwrap();
    assert!(result.succeeded(), "run failed: {:?}", result.run.error);

    let run_dir = dir.path().join("fs-run");
    for stage in StageName::ALL {
        let path = run_dir.join(format!("{}.json", stage.as_str()));
        assert!(path.exists(), "missing {}", path.display());
    }
    assert!(run_dir.join("run.json").exists());
    let report = std::fs::read_to_string(run_dir.join("report.md")).unwrap();
    assert_eq!(Some(report), result.report);

    // a fresh store over the same directory sees the finished run
    let reopened = FsArtifactStore::new(dir.path());
    let manifest = reopened.read_manifest("fs-run").await.unwrap().unwrap();
    assert_eq!(manifest.status, RunStatus::Succeeded);
    assert!(manifest.finished_at.is_some());
    assert!(reopened.read_manifest("other").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sqlite_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("runs.db");
    let store = Arc::new(SqliteArtifactStore::open(&db_path).unwrap());
    let controller = PipelineController::new(store, Arc::new(CannedClient::new()), fast_config());

    let result = controller
        .run("sqlite-run", params(SimulationKind::Interview, 1, 2))
        .await
        .unwrap();
    assert!(result.succeeded(), "run failed: {:?}", result.run.error);
    drop(controller);

    let reopened = SqliteArtifactStore::open(&db_path).unwrap();
    assert_eq!(
        reopened.list_stages("sqlite-run").await.unwrap(),
        StageName::ALL.to_vec()
    );
    let design = reopened
        .read_artifact("sqlite-run", StageName::Design)
        .await
        .unwrap()
        .unwrap();
    assert!(design.get("document").is_some());
    assert_eq!(reopened.read_report("sqlite-run").await.unwrap(), result.report);
}

#[tokio::test]
async fn test_config_file_selects_store_backend() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    writeln!(
        file,
        "[provider]\nprovider = \"canned\"\n\n[storage]\nbackend = \"sqlite\"\noutput_dir = {:?}\n\n\
         [fallback]\nsentiment_default = \"skewed\"",
        dir.path().display().to_string()
    )
    .unwrap();

    let config = load_config(Some(&config_path)).unwrap();
    assert!(config.is_offline());
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);

    let store = open_store(&config.storage).unwrap();
    assert_eq!(store.name(), "sqlite");
    assert!(dir.path().join(DATABASE_FILE).exists());
}
