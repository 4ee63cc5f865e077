//! Test fixtures for deterministic testing

#![allow(dead_code)]

use serde_json::Value;
use snapback::io::store::{KeyValueStore, MemoryStore};
use snapback::models::{DecisionContextSummary, ProtectionDecision, SaveContext};
use snapback::services::coordinator::CoordinatorOptions;
use snapback::{DecisionReason, OperationCoordinator};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// 2023-11-14T22:13:20Z
pub const T0: i64 = 1_700_000_000_000;

/// Write a file relative to `root`, creating parent directories
pub fn write_file_sync<P: AsRef<Path>>(path: P, contents: &[u8]) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

pub fn write_rel(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    write_file_sync(&path, contents.as_bytes()).unwrap();
    path
}

/// Small source tree used by capture and restore tests
pub fn create_workspace_fixture(root: &Path) {
    write_rel(root, "src/main.ts", "console.log('main');\n");
    write_rel(root, "src/util.ts", "export const x = 1;\n");
    write_rel(root, "README.md", "# demo\n");
    write_rel(root, ".env", "API_KEY=secret\n");
}

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Memory store whose writes to chosen keys fail, as a full disk would
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: Mutex<Vec<String>>,
}

impl FailingStore {
    pub fn fail_writes_to(&self, key: &str) {
        self.failing.lock().unwrap().push(key.to_string());
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> snapback::Result<Option<Value>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) -> snapback::Result<()> {
        if self.failing.lock().unwrap().iter().any(|k| k == key) {
            return Err(snapback::Error::System("disk full".to_string()));
        }
        self.inner.set(key, value)
    }
}

pub fn coordinator(root: &Path) -> OperationCoordinator {
    coordinator_with(root, CoordinatorOptions::default())
}

pub fn coordinator_with(root: &Path, options: CoordinatorOptions) -> OperationCoordinator {
    OperationCoordinator::new(root, memory_store(), options).unwrap()
}

/// A valid context with every signal off
pub fn quiet_context() -> SaveContext {
    SaveContext {
        repo_id: "repo-1".to_string(),
        timestamp: T0,
        files: Vec::new(),
        ai_detected: false,
        ai_tool_name: None,
        ai_confidence: 0.0,
        session_id: "session-1".to_string(),
        session_file_count: 1,
        session_duration_ms: 1_000,
        risk_score: 0.0,
        burst_detected: false,
        contains_critical_files: false,
        critical_file_count: 0,
    }
}

/// A decision that asks for a snapshot, as the engine would produce for a burst
pub fn snapshot_decision() -> ProtectionDecision {
    ProtectionDecision {
        create_snapshot: true,
        show_notification: true,
        reasons: vec![DecisionReason::BurstPattern],
        confidence: 0.3,
        summary: "burst of 4 files".to_string(),
        context: DecisionContextSummary {
            risk_score: 20.0,
            session_id: "session-1".to_string(),
            files_in_session: 4,
            critical_file_count: 0,
            ai_tool_name: None,
        },
    }
}
