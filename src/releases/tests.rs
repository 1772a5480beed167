//! Tests for the release index and its fetch-and-publish pipeline.

use super::*;
use crate::config::Config;
use crate::context::DatasetPaths;
use crate::dataset::{ControllerState, SyncController, SyncSettings};
use crate::locks::LockManager;
use crate::test_support::{MockSource, page, release_item};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn fast_options() -> PipelineOptions {
    PipelineOptions {
        page_delay: Duration::ZERO,
        ..PipelineOptions::default()
    }
}

fn three_pages() -> MockSource {
    MockSource::new(vec![
        page(1, 3, vec![release_item("g1", "a1"), release_item("g2", "b1")]),
        page(2, 3, vec![release_item("g1", "a2")]),
        page(3, 3, vec![release_item("g3", "c1")]),
    ])
}

#[tokio::test]
async fn test_requests_every_page_in_order_and_merges() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("releases.json");
    let source = three_pages();
    let started = Utc::now();

    let report = fetch_and_publish(&source, &target, &fast_options())
        .await
        .unwrap();

    assert_eq!(source.requested(), vec![1, 2, 3]);
    assert_eq!(report.pages, 3);
    assert_eq!(report.accepted, 4);
    assert_eq!(report.skipped, 0);
    assert!(report.last_updated >= started);
    assert_eq!(report.bytes, std::fs::metadata(&target).unwrap().len());

    let snapshot = read_snapshot(&target).unwrap();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.group_count(), 3);
    assert_eq!(snapshot.get("g1").len(), 2);
    assert_eq!(snapshot.last_updated, Some(report.last_updated));

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(raw["version"], json!(1));
    assert_eq!(raw["entries"].as_array().unwrap().len(), 4);
    assert!(raw["lastUpdated"].is_string());
}

#[tokio::test]
async fn test_zero_total_pages_still_requests_first_page() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("releases.json");
    let source = MockSource::new(vec![page(1, 0, vec![])]);

    let report = fetch_and_publish(&source, &target, &fast_options())
        .await
        .unwrap();

    assert_eq!(source.requested(), vec![1]);
    assert_eq!(report.accepted, 0);
    assert!(read_snapshot(&target).unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_entries_are_skipped_and_counted() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("releases.json");
    let source = MockSource::new(vec![page(
        1,
        1,
        vec![
            release_item("g1", "good"),
            json!({"groupId": "g1", "hash": "REDACTED", "preferred": true}),
            json!({"groupId": "g1", "hash": "h2"}),
            json!("not an object"),
        ],
    )]);

    let report = fetch_and_publish(&source, &target, &fast_options())
        .await
        .unwrap();

    assert_eq!(report.accepted, 1);
    assert_eq!(report.skipped, 3);
    assert_eq!(read_snapshot(&target).unwrap().get("g1")[0].hash, "good");
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_file_and_removes_staging() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("releases.json");

    fetch_and_publish(&three_pages(), &target, &fast_options())
        .await
        .unwrap();
    let before = std::fs::read(&target).unwrap();

    let failing = three_pages().failing_on(2, SyncError::RemoteFetch("503".to_string()));
    let err = fetch_and_publish(&failing, &target, &fast_options())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::RemoteFetch(_)));
    assert_eq!(failing.requested(), vec![1, 2]);
    assert_eq!(std::fs::read(&target).unwrap(), before);
    assert!(!temp.path().join("releases.json.tmp").exists());
}

#[tokio::test]
async fn test_page_delay_spaces_requests() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("releases.json");
    let options = PipelineOptions {
        page_delay: Duration::from_millis(40),
        ..PipelineOptions::default()
    };

    let started = std::time::Instant::now();
    fetch_and_publish(&three_pages(), &target, &options)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[test]
fn test_snapshot_dedupes_repeated_hashes_within_group() {
    let release = |group: &str, hash: &str| Release {
        group_id: group.to_string(),
        hash: hash.to_string(),
        title: None,
        size: None,
        preferred: false,
    };

    let snapshot = ReleaseSnapshot::from_entries(
        vec![release("g", "a"), release("g", "b"), release("g", "a"), release("h", "a")],
        None,
    );

    assert_eq!(snapshot.len(), 3);
    let hashes: Vec<_> = snapshot.get("g").iter().map(|r| r.hash.as_str()).collect();
    assert_eq!(hashes, vec!["a", "b"]);
}

#[test]
fn test_read_snapshot_distinguishes_missing_from_corrupt() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("releases.json");

    assert!(matches!(
        read_snapshot(&path).unwrap_err(),
        SyncError::Persistence(_)
    ));

    std::fs::write(&path, r#"{"version":1,"entries":[{"groupId":"g""#).unwrap();
    assert!(read_snapshot(&path).unwrap_err().is_corrupt_snapshot());

    std::fs::write(
        &path,
        r#"{"version":2,"entries":[],"lastUpdated":"2026-01-01T00:00:00Z"}"#,
    )
    .unwrap();
    assert!(read_snapshot(&path).unwrap_err().is_corrupt_snapshot());
}

#[tokio::test]
async fn test_get_releases_is_empty_before_load_and_for_unknown_groups() {
    let temp = TempDir::new().unwrap();
    let index = ReleaseIndex::new(
        "releases",
        three_pages(),
        temp.path().join("releases.json"),
        fast_options(),
    );

    assert!(index.get_releases("g1").is_empty());
    assert!(index.is_empty());

    index.perform_sync().await.unwrap();
    // Publishing alone does not touch the in-memory snapshot.
    assert!(index.get_releases("g1").is_empty());

    index.reload_from_file().await.unwrap();
    assert_eq!(index.get_releases("g1").len(), 2);
    assert!(index.get_releases("missing").is_empty());
    assert_eq!(index.len(), 4);
    assert_eq!(index.last_report().unwrap().accepted, 4);
}

#[tokio::test]
async fn test_published_file_reloads_into_same_structure() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("releases.json");

    let writer = ReleaseIndex::new("releases", three_pages(), &target, fast_options());
    writer.perform_sync().await.unwrap();
    writer.reload_from_file().await.unwrap();

    let reader = ReleaseIndex::new(
        "releases",
        MockSource::new(vec![]),
        &target,
        fast_options(),
    );
    reader.reload_from_file().await.unwrap();

    assert_eq!(*reader.snapshot(), *writer.snapshot());
}

#[tokio::test]
async fn test_controller_initialises_index_from_remote() {
    let temp = TempDir::new().unwrap();
    let mut config = Config {
        data_dir: temp.path().to_path_buf(),
        ..Config::default()
    };
    config.datasets.push(crate::config::DatasetConfig::new(
        "releases",
        "http://127.0.0.1:9/api",
    ));
    let dataset = config.dataset("releases").unwrap().clone();
    let paths = config.paths_for(&dataset);

    let index = ReleaseIndex::new("releases", three_pages(), &paths.file, fast_options());
    let controller = SyncController::new(
        index,
        LockManager::new().with_poll_interval(Duration::from_millis(10)),
        SyncSettings::for_dataset(&config, &dataset),
    );

    assert!(controller.dataset().get_releases("g3").is_empty());
    controller.initialise().await.unwrap();

    assert_eq!(controller.state(), ControllerState::Ready);
    assert_eq!(controller.dataset().get_releases("g3").len(), 1);
    assert!(paths.file.exists());
    assert!(!paths.staging_file.exists());
    assert!(!controller.settings().lock_options.directory.join("releases.lock").exists());

    controller.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_mid_sync_removes_lock_and_staging_file() {
    let temp = TempDir::new().unwrap();
    let paths = DatasetPaths::new(temp.path(), "releases", "releases.json");

    let seed = ReleaseIndex::new(
        "releases",
        MockSource::new(vec![page(1, 1, vec![release_item("old", "o1")])]),
        &paths.file,
        fast_options(),
    );
    seed.perform_sync().await.unwrap();
    let before = std::fs::read(&paths.file).unwrap();

    let slow = PipelineOptions {
        page_delay: Duration::from_millis(400),
        ..PipelineOptions::default()
    };
    let settings = SyncSettings {
        refresh_interval: Duration::from_millis(50),
        max_sync_retries: 0,
        lock_key: paths.lock_key.clone(),
        lock_options: paths.lock_options(),
        data_file: paths.file.clone(),
    };
    let controller = SyncController::new(
        ReleaseIndex::new("releases", three_pages(), &paths.file, slow),
        LockManager::new().with_poll_interval(Duration::from_millis(10)),
        settings,
    );
    controller.initialise().await.unwrap();
    assert_eq!(controller.dataset().get_releases("old").len(), 1);

    // The first refresh fetches page 1, then sits in the page delay.
    let lock_file = paths.locks_dir.join("releases.lock");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(lock_file.exists());
    assert!(paths.staging_file.exists());

    controller.shutdown().await;

    assert!(!lock_file.exists());
    assert!(!paths.staging_file.exists());
    assert_eq!(std::fs::read(&paths.file).unwrap(), before);
    assert_eq!(controller.dataset().source().requested(), vec![1]);
    assert_eq!(controller.dataset().get_releases("old").len(), 1);
}
