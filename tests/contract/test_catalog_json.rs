//! Persisted catalog and workspace memory keep their JSON shape

use crate::fixtures::{T0, create_workspace_fixture, snapshot_decision};
use serde_json::json;
use snapback::io::store::{CATALOG_KEY, KeyValueStore, MemoryStore, WORKSPACE_MEMORY_KEY};
use snapback::services::coordinator::CoordinatorOptions;
use snapback::services::orchestrator::StorageConfig;
use snapback::{
    DecisionReason, OperationCoordinator, RestoreOptions, SnapshotOrchestrator, SnapshotRequest,
};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn catalog_entries_use_camel_case_keys() {
    let temp = TempDir::new().unwrap();
    create_workspace_fixture(temp.path());
    let store = Arc::new(MemoryStore::new());
    let mut coord =
        OperationCoordinator::new(temp.path(), store.clone(), CoordinatorOptions::default())
            .unwrap();

    let request = SnapshotRequest::incremental(vec!["src/main.ts".to_string()])
        .with_decision(snapshot_decision());
    let id = coord.coordinate_snapshot_creation(request, T0).unwrap();
    coord
        .restore_to_snapshot(&id, &RestoreOptions::default(), T0 + 5)
        .unwrap();

    let catalog = store.get(CATALOG_KEY).unwrap().unwrap();
    let entry = &catalog.as_array().unwrap()[0];
    for key in [
        "id",
        "name",
        "timestamp",
        "fileCount",
        "totalSize",
        "metadata",
        "recoverable",
        "checksum",
    ] {
        assert!(entry.get(key).is_some(), "missing {key}");
    }
    assert_eq!(entry["id"], json!(id));
    assert_eq!(entry["fileCount"], json!(1));

    let metadata = &entry["metadata"];
    assert_eq!(metadata["trigger"], json!("burst"));
    assert_eq!(metadata["reasons"], json!(["burst_pattern"]));
    assert_eq!(metadata["sessionId"], json!("session-1"));
    assert_eq!(metadata["lastProtectedAt"], json!(T0 + 5));
    assert_eq!(metadata["files"], json!(["src/main.ts"]));
    assert!(metadata.get("aiToolName").is_none());

    let memory = store.get(WORKSPACE_MEMORY_KEY).unwrap().unwrap();
    assert_eq!(memory["lastSnapshotId"], json!(id));
    assert_eq!(memory["lastSnapshotAt"], json!(T0));
    assert_eq!(memory["snapshotsCreated"], json!(1));
}

#[test]
fn catalog_written_elsewhere_is_hydrated() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            CATALOG_KEY,
            json!([
                {
                    "id": "a1",
                    "name": "SnapBack-AI-DETECTED-2023-11-14_22-13-20",
                    "timestamp": T0,
                    "fileCount": 2,
                    "totalSize": 300,
                    "metadata": {
                        "trigger": "ai-detected",
                        "reasons": ["ai_detected", "critical_file"],
                        "confidence": 0.9,
                        "riskScore": 70.0,
                        "aiToolName": "Copilot"
                    },
                    "recoverable": true,
                    "checksum": "abc"
                },
                {
                    "id": "b2",
                    "name": "legacy",
                    "timestamp": T0 - 10,
                    "fileCount": 1,
                    "totalSize": 100,
                    "recoverable": false,
                    "checksum": "def"
                }
            ]),
        )
        .unwrap();

    let orchestrator = SnapshotOrchestrator::open(store, StorageConfig::default()).unwrap();

    assert_eq!(orchestrator.len(), 2);
    assert_eq!(orchestrator.total_storage_used(), 400);
    let a1 = orchestrator.get_snapshot("a1").unwrap();
    assert_eq!(
        a1.metadata.reasons,
        vec![DecisionReason::AiDetected, DecisionReason::CriticalFile]
    );
    assert_eq!(a1.metadata.ai_tool_name.as_deref(), Some("Copilot"));
    let b2 = orchestrator.get_snapshot("b2").unwrap();
    assert!(b2.metadata.trigger.is_none());
    assert!(!orchestrator.can_restore("b2"));
}
