//! Snapshot catalog admission, eviction and persistence

use crate::fixtures::{T0, memory_store, snapshot_decision};
use snapback::io::store::{CATALOG_KEY, KeyValueStore};
use snapback::models::{IntentFile, SnapshotIntent, SnapshotMetadata, SnapshotTrigger};
use snapback::services::orchestrator::{StorageConfig, snapshot_name};
use snapback::{FileContext, SnapshotOrchestrator};
use std::collections::BTreeMap;
use std::sync::Arc;

fn intent(id: &str, timestamp: i64, size: u64) -> SnapshotIntent {
    let mut files = BTreeMap::new();
    files.insert(
        format!("{id}.ts"),
        IntentFile {
            size_bytes: size,
            is_binary: false,
            content: None,
        },
    );
    SnapshotIntent {
        id: id.to_string(),
        files,
        name: id.to_string(),
        trigger: SnapshotTrigger::Manual,
        metadata: SnapshotMetadata::default(),
        timestamp,
    }
}

fn orchestrator(max_snapshots: usize, max_storage_bytes: u64) -> SnapshotOrchestrator {
    SnapshotOrchestrator::open(
        memory_store(),
        StorageConfig {
            max_snapshots,
            max_storage_bytes,
            retention_days: 30,
        },
    )
    .unwrap()
}

#[test]
fn count_bound_evicts_exactly_the_oldest() {
    let mut orch = orchestrator(3, 1_000_000);
    orch.store_snapshot(intent("b", T0 + 2, 10)).unwrap();
    orch.store_snapshot(intent("a", T0 + 1, 10)).unwrap();
    orch.store_snapshot(intent("c", T0 + 3, 10)).unwrap();

    let admission = orch.store_snapshot(intent("d", T0 + 4, 10)).unwrap();

    let evicted: Vec<&str> = admission.evicted.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(evicted, vec!["a"]);
    assert_eq!(orch.len(), 3);
    assert!(orch.get_snapshot("a").is_none());
}

#[test]
fn byte_bound_evicts_oldest_until_candidate_fits() {
    let mut orch = orchestrator(10, 100);
    orch.store_snapshot(intent("old", T0, 40)).unwrap();
    orch.store_snapshot(intent("mid", T0 + 1, 40)).unwrap();
    orch.store_snapshot(intent("new", T0 + 2, 10)).unwrap();
    assert_eq!(orch.total_storage_used(), 90);

    let admission = orch.store_snapshot(intent("big", T0 + 3, 50)).unwrap();

    let evicted: Vec<&str> = admission.evicted.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(evicted, vec!["old"]);
    assert_eq!(orch.total_storage_used(), 100);
    assert!(orch.get_snapshot("new").is_some());
}

#[test]
fn oversized_candidate_is_rejected_without_eviction() {
    let mut orch = orchestrator(10, 100);
    orch.store_snapshot(intent("keep", T0, 60)).unwrap();

    let err = orch.store_snapshot(intent("huge", T0 + 1, 101)).unwrap_err();

    assert!(matches!(
        err,
        snapback::Error::StorageExceeded {
            required: 101,
            budget: 100
        }
    ));
    assert_eq!(orch.len(), 1);
    assert_eq!(orch.total_storage_used(), 60);
}

#[test]
fn binary_files_do_not_count_against_storage() {
    let mut orch = orchestrator(10, 100);
    let mut candidate = intent("mixed", T0, 30);
    candidate.files.insert(
        "logo.png".to_string(),
        IntentFile {
            size_bytes: 10_000,
            is_binary: true,
            content: None,
        },
    );

    let admission = orch.store_snapshot(candidate).unwrap();
    assert_eq!(admission.snapshot.total_size, 30);
    assert_eq!(admission.snapshot.file_count, 1);
}

#[test]
fn catalog_survives_reopen() {
    let store = memory_store();
    let config = StorageConfig::default();
    {
        let mut orch = SnapshotOrchestrator::open(store.clone(), config).unwrap();
        orch.store_snapshot(intent("one", T0, 5)).unwrap();
        orch.store_snapshot(intent("two", T0 + 1, 7)).unwrap();
    }

    let reopened = SnapshotOrchestrator::open(store.clone(), config).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.total_storage_used(), 12);
    let listed: Vec<&str> = reopened
        .list_snapshots()
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(listed, vec!["two", "one"]);

    let raw = store.get(CATALOG_KEY).unwrap().unwrap();
    assert_eq!(raw.as_array().map(Vec::len), Some(2));
}

#[test]
fn cleanup_applies_retention_window() {
    let mut orch = orchestrator(10, 1_000);
    let day = 24 * 60 * 60 * 1000;
    orch.store_snapshot(intent("ancient", T0 - 31 * day, 1)).unwrap();
    orch.store_snapshot(intent("recent", T0 - day, 1)).unwrap();

    let removed = orch.cleanup(T0).unwrap();

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, "ancient");
    assert!(orch.can_restore("recent"));
    assert!(!orch.can_restore("ancient"));
}

#[test]
fn create_snapshot_follows_the_decision() {
    let mut orch = orchestrator(10, 1_000);
    let files = vec![
        FileContext {
            path: "src/a.ts".to_string(),
            extension: "ts".to_string(),
            size_bytes: 12,
            is_new: false,
            is_binary: false,
            prev_hash: None,
            next_hash: "0".repeat(16),
        },
        FileContext {
            path: "img/a.png".to_string(),
            extension: "png".to_string(),
            size_bytes: 500,
            is_new: true,
            is_binary: true,
            prev_hash: None,
            next_hash: "1".repeat(16),
        },
    ];

    let mut skip = snapshot_decision();
    skip.create_snapshot = false;
    assert!(orch.create_snapshot(&skip, &files, T0).unwrap().is_none());

    let admission = orch
        .create_snapshot(&snapshot_decision(), &files, T0)
        .unwrap()
        .unwrap();
    let snap = admission.snapshot;
    assert_eq!(snap.file_count, 1);
    assert_eq!(snap.total_size, 12);
    assert_eq!(snap.metadata.trigger, Some(SnapshotTrigger::Burst));
    assert_eq!(snap.metadata.files, vec!["src/a.ts".to_string()]);
    assert!(snap.name.starts_with("SnapBack-BURST-"));
    assert_eq!(snap.checksum.len(), 64);
}

#[test]
fn mark_protected_and_delete() {
    let mut orch = orchestrator(10, 1_000);
    orch.store_snapshot(intent("x", T0, 3)).unwrap();

    orch.mark_protected("x", T0 + 5).unwrap();
    assert_eq!(
        orch.get_snapshot("x").unwrap().metadata.last_protected_at,
        Some(T0 + 5)
    );

    orch.delete_snapshot("x").unwrap();
    assert_eq!(orch.total_storage_used(), 0);
    assert!(matches!(
        orch.restore_snapshot("x"),
        Err(snapback::Error::NotFound(_))
    ));
}

#[test]
fn names_embed_trigger_and_utc_time() {
    assert_eq!(
        snapshot_name(SnapshotTrigger::AiDetected, T0),
        "SnapBack-AI-DETECTED-2023-11-14_22-13-20"
    );
}

#[test]
fn store_handle_is_shared() {
    let store = memory_store();
    let dyn_store: Arc<dyn KeyValueStore> = store.clone();
    let mut orch = SnapshotOrchestrator::open(dyn_store, StorageConfig::default()).unwrap();
    orch.store_snapshot(intent("s", T0, 1)).unwrap();
    assert!(store.get(CATALOG_KEY).unwrap().is_some());
}
