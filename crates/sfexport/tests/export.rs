//! End-to-end export runs against in-memory endpoints.

mod common;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{BodyBehavior, BrokenLedger, FakeStore, Harness, config, ledger_ids, transient};
use sfexport::{CheckpointStore, ExportError};
use sfexport_core::error::{Error, StorageError};

const T100: &str = "2024-01-01T00:01:40.000+0000";
const T90: &str = "2024-01-01T00:01:30.000+0000";

fn abc_store() -> FakeStore {
    let store = FakeStore::new();
    store.add("C", T90, 30, "c.txt");
    store.add("B", T100, 20, "b.pdf");
    store.add("A", T100, 10, "a.png");
    store
}

#[tokio::test]
async fn pages_follow_total_order_and_checkpoint_advances() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    let exporter = harness.exporter(config(dir.path(), 2)).await;

    let summary = exporter.run().await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.downloaded, 3);
    assert_eq!(summary.bytes, 60);
    assert!(!summary.stopped_at_limit);

    let queries = harness.store.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 3);
    assert!(queries[0].after.is_none());
    let after_first = queries[1].after.as_ref().unwrap();
    assert_eq!(after_first.last_id.as_str(), "B");
    assert_eq!(after_first.last_timestamp.to_literal(), "2024-01-01T00:01:40Z");
    assert_eq!(queries[2].after.as_ref().unwrap().last_id.as_str(), "C");

    let saved = CheckpointStore::new(dir.path().join("last_marker.json"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(saved.last_id.as_str(), "C");
    assert_eq!(saved.last_timestamp.to_literal(), "2024-01-01T00:01:30Z");
    assert_eq!(summary.checkpoint, Some(saved));

    let out = dir.path().join("attachments");
    assert_eq!(fs::read(out.join("A.png")).unwrap(), harness.store.body("A"));
    assert_eq!(fs::read(out.join("B.pdf")).unwrap(), harness.store.body("B"));
    assert_eq!(fs::read(out.join("C.txt")).unwrap(), harness.store.body("C"));

    let mut ids = ledger_ids(&dir.path().join("attachments_metadata.csv"));
    ids.sort();
    assert_eq!(ids, ["A", "B", "C"]);
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;

    let first = harness.exporter(config(dir.path(), 2)).await.run().await.unwrap();
    let second = harness.exporter(config(dir.path(), 2)).await.run().await.unwrap();

    assert_eq!(first.downloaded, 3);
    assert_eq!(second.pages, 0);
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.checkpoint, first.checkpoint);
    for id in ["A", "B", "C"] {
        assert_eq!(harness.store.body_requests(id), 1);
    }
    assert_eq!(ledger_ids(&dir.path().join("attachments_metadata.csv")).len(), 3);
}

#[tokio::test]
async fn rescan_skips_complete_files() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;

    let first = harness.exporter(config(dir.path(), 2)).await.run().await.unwrap();
    fs::remove_file(dir.path().join("last_marker.json")).unwrap();
    let second = harness.exporter(config(dir.path(), 2)).await.run().await.unwrap();

    assert_eq!(second.skipped, 3);
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.checkpoint, first.checkpoint);
    for id in ["A", "B", "C"] {
        assert_eq!(harness.store.body_requests(id), 1);
    }
    assert_eq!(ledger_ids(&dir.path().join("attachments_metadata.csv")).len(), 3);
}

#[tokio::test]
async fn page_limit_then_resume() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;

    let mut limited = config(dir.path(), 2);
    limited.max_pages = Some(1);
    let first = harness.exporter(limited).await.run().await.unwrap();

    assert_eq!(first.pages, 1);
    assert!(first.stopped_at_limit);
    assert_eq!(first.checkpoint.as_ref().unwrap().last_id.as_str(), "B");
    assert!(!dir.path().join("attachments").join("C.txt").exists());

    let second = harness.exporter(config(dir.path(), 2)).await.run().await.unwrap();

    assert_eq!(second.pages, 1);
    assert_eq!(second.downloaded, 1);
    assert_eq!(second.checkpoint.as_ref().unwrap().last_id.as_str(), "C");
    assert_eq!(harness.store.body_requests("A"), 1);
    assert_eq!(harness.store.body_requests("C"), 1);
}

#[tokio::test]
async fn truncated_transfer_is_retried_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    harness.store.set_behavior("B", BodyBehavior::TruncatedFor(2));

    let summary = harness.exporter(config(dir.path(), 10)).await.run().await.unwrap();

    assert_eq!(summary.downloaded, 3);
    assert_eq!(harness.store.body_requests("B"), 3);
    let on_disk = fs::read(dir.path().join("attachments").join("B.pdf")).unwrap();
    assert_eq!(on_disk.len(), 20);
}

#[tokio::test]
async fn persistent_truncation_is_failed_not_downloaded() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    harness.store.set_behavior("B", BodyBehavior::AlwaysTruncated);

    let summary = harness.exporter(config(dir.path(), 10)).await.run().await.unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_ids[0].as_str(), "B");
    // max_retries = 3
    assert_eq!(harness.store.body_requests("B"), 4);

    let out = dir.path().join("attachments");
    assert!(!out.join("B.pdf").exists());
    assert!(!out.join("B.pdf.part").exists());
    let ids = ledger_ids(&dir.path().join("attachments_metadata.csv"));
    assert!(!ids.contains(&"B".to_string()));

    // A failed record does not hold back the checkpoint.
    assert_eq!(summary.checkpoint.unwrap().last_id.as_str(), "C");
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    harness.store.set_behavior("A", BodyBehavior::NotFound);

    let summary = harness.exporter(config(dir.path(), 10)).await.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(harness.store.body_requests("A"), 1);
}

#[tokio::test]
async fn panicking_download_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    harness.store.set_behavior("C", BodyBehavior::Panic);

    let summary = harness.exporter(config(dir.path(), 10)).await.run().await.unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_ids.len(), 1);
    assert_eq!(summary.failed_ids[0].as_str(), "C");
    assert_eq!(summary.pages, 1);

    let marker = CheckpointStore::new(dir.path().join("last_marker.json"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(marker.last_id.as_str(), "C");
}

#[tokio::test]
async fn wrong_size_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    let out = dir.path().join("attachments");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("A.png"), b"stale").unwrap();

    let summary = harness.exporter(config(dir.path(), 10)).await.run().await.unwrap();

    assert_eq!(summary.downloaded, 3);
    assert_eq!(fs::read(out.join("A.png")).unwrap(), harness.store.body("A"));
}

#[tokio::test]
async fn concurrent_expiry_triggers_one_login() {
    let dir = tempfile::tempdir().unwrap();
    let store = FakeStore::new();
    for i in 0..10 {
        let id = format!("R{i:02}");
        store.add(&id, T100, 8, "x.bin");
        store.set_behavior(&id, BodyBehavior::ExpireFirstToken);
    }
    let harness = Harness::new(store).await;
    assert_eq!(harness.logins(), 1);

    let mut cfg = config(dir.path(), 10);
    cfg.concurrency = 10;
    let summary = harness.exporter(cfg).await.run().await.unwrap();

    assert_eq!(summary.downloaded, 10);
    assert_eq!(summary.failed, 0);
    assert_eq!(harness.logins(), 2);
    assert_eq!(
        harness.session.current().await.access_token().as_str(),
        "token-2"
    );
}

#[tokio::test]
async fn page_fetch_failure_stops_and_keeps_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    harness.store.script_queries(vec![None, Some(transient())]);

    let err = harness
        .exporter(config(dir.path(), 2))
        .await
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Fetch { pages: 1, .. }));
    let saved = CheckpointStore::new(dir.path().join("last_marker.json"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(saved.last_id.as_str(), "B");
    assert!(!dir.path().join("attachments").join("C.txt").exists());

    // The next run picks up at page two.
    let summary = harness.exporter(config(dir.path(), 2)).await.run().await.unwrap();
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.checkpoint.unwrap().last_id.as_str(), "C");
}

#[tokio::test]
async fn corrupt_checkpoint_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("last_marker.json"), "garbage").unwrap();
    let harness = Harness::new(abc_store()).await;

    let err = harness
        .exporter(config(dir.path(), 2))
        .await
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExportError::Checkpoint(Error::Storage(StorageError::Corrupt { .. }))
    ));
    assert!(harness.store.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_store_leaves_no_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeStore::new()).await;

    let summary = harness.exporter(config(dir.path(), 2)).await.run().await.unwrap();

    assert_eq!(summary, sfexport::RunSummary::default());
    assert!(!dir.path().join("last_marker.json").exists());
}

#[tokio::test]
async fn zero_length_records_are_never_visited() {
    let dir = tempfile::tempdir().unwrap();
    let store = abc_store();
    store.add("Z", T100, 0, "empty.txt");
    let harness = Harness::new(store).await;

    let summary = harness.exporter(config(dir.path(), 2)).await.run().await.unwrap();

    assert_eq!(summary.downloaded, 3);
    assert_eq!(harness.store.body_requests("Z"), 0);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    let mut cfg = config(dir.path(), 2);
    cfg.concurrency = 0;

    let result = sfexport::Exporter::new(
        cfg,
        std::sync::Arc::clone(&harness.store),
        std::sync::Arc::clone(&harness.store),
        harness.session.clone(),
    )
    .await;

    assert!(matches!(result, Err(ExportError::Setup(_))));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_body_waits_then_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    harness
        .store
        .set_behavior("B", BodyBehavior::RateLimitedOnce(Duration::from_secs(30)));

    let started = tokio::time::Instant::now();
    let summary = harness.exporter(config(dir.path(), 10)).await.run().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(summary.downloaded, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(harness.store.body_requests("B"), 2);
    assert_eq!(
        fs::read(dir.path().join("attachments").join("B.pdf")).unwrap(),
        harness.store.body("B")
    );
}

#[tokio::test]
async fn ledger_failure_keeps_download() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(abc_store()).await;
    let ledger = Arc::new(BrokenLedger::new());

    let summary = harness
        .exporter_with_ledger(config(dir.path(), 10), ledger.clone())
        .await
        .run()
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 3);
    assert_eq!(summary.failed, 0);
    assert!(summary.failed_ids.is_empty());
    assert_eq!(ledger.appends.load(Ordering::SeqCst), 3);
    assert!(dir.path().join("attachments").join("A.png").exists());
    assert!(!dir.path().join("attachments_metadata.csv").exists());
    assert_eq!(summary.checkpoint.unwrap().last_id.as_str(), "C");
}
