//! Snapshot catalog with count/byte admission and oldest-first eviction.
//!
//! The catalog and its running byte total are mutated only here, and every
//! mutation is mirrored to the key-value store before the call returns.

use crate::io::store::{CATALOG_KEY, KeyValueStore, KeyValueStoreExt};
use crate::models::{
    FileContext, IntentFile, PersistedSnapshot, ProtectionDecision, SnapshotIntent,
    SnapshotMetadata, SnapshotTrigger,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub max_snapshots: usize,
    pub max_storage_bytes: u64,
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_snapshots: 50,
            max_storage_bytes: 100 * 1024 * 1024,
            retention_days: 30,
        }
    }
}

/// Result of admitting a snapshot into the catalog
#[derive(Debug, Clone)]
pub struct Admission {
    pub snapshot: PersistedSnapshot,
    /// Entries removed to make room, oldest first
    pub evicted: Vec<PersistedSnapshot>,
}

/// Display name: `SnapBack-{TRIGGER}-{date}`
#[must_use]
pub fn snapshot_name(trigger: SnapshotTrigger, timestamp: i64) -> String {
    let date = chrono::DateTime::from_timestamp_millis(timestamp)
        .map(|dt| dt.format("%Y-%m-%d_%H-%M-%S").to_string())
        .unwrap_or_else(|| timestamp.to_string());
    format!("SnapBack-{}-{date}", trigger.as_str().to_ascii_uppercase())
}

/// Fingerprint of the sorted path set; identifies which files a snapshot covers,
/// not their contents
#[must_use]
pub fn path_checksum<'a, I: IntoIterator<Item = &'a str>>(paths: I) -> String {
    let mut sorted: Vec<&str> = paths.into_iter().collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for path in sorted {
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Metadata for a snapshot taken on behalf of `decision` (or manually, without one)
#[must_use]
pub fn metadata_for(
    decision: Option<&ProtectionDecision>,
    trigger: SnapshotTrigger,
) -> SnapshotMetadata {
    let mut metadata = SnapshotMetadata {
        trigger: Some(trigger),
        ..SnapshotMetadata::default()
    };
    if let Some(decision) = decision {
        metadata.reasons.clone_from(&decision.reasons);
        metadata.confidence = decision.confidence;
        metadata.risk_score = decision.context.risk_score;
        metadata.session_id = Some(decision.context.session_id.clone());
        metadata.ai_tool_name.clone_from(&decision.context.ai_tool_name);
    }
    metadata
}

/// Build an intent for the decided file set; binary files are dropped
#[must_use]
pub fn intent_from_decision(
    decision: &ProtectionDecision,
    files: &[FileContext],
    now: i64,
) -> SnapshotIntent {
    let trigger = SnapshotTrigger::from_reasons(&decision.reasons);
    let files: BTreeMap<String, IntentFile> = files
        .iter()
        .filter(|f| !f.is_binary)
        .map(|f| {
            (
                f.path.clone(),
                IntentFile {
                    size_bytes: f.size_bytes,
                    is_binary: false,
                    content: None,
                },
            )
        })
        .collect();

    let mut metadata = metadata_for(Some(decision), trigger);
    metadata.files = files.keys().cloned().collect();

    SnapshotIntent {
        id: uuid::Uuid::new_v4().to_string(),
        name: snapshot_name(trigger, now),
        trigger,
        metadata,
        files,
        timestamp: now,
    }
}

pub struct SnapshotOrchestrator {
    store: Arc<dyn KeyValueStore>,
    config: StorageConfig,
    catalog: HashMap<String, PersistedSnapshot>,
    total_storage_used: u64,
}

impl std::fmt::Debug for SnapshotOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotOrchestrator")
            .field("config", &self.config)
            .field("snapshots", &self.catalog.len())
            .field("total_storage_used", &self.total_storage_used)
            .finish_non_exhaustive()
    }
}

impl SnapshotOrchestrator {
    /// Hydrate the catalog from `store`. The returned orchestrator is authoritative.
    pub fn open(store: Arc<dyn KeyValueStore>, config: StorageConfig) -> Result<Self> {
        let persisted: Vec<PersistedSnapshot> = store.get_or(CATALOG_KEY, Vec::new())?;
        let total_storage_used = persisted.iter().map(|s| s.total_size).sum();
        let catalog = persisted
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect::<HashMap<_, _>>();

        log::debug!(
            "Hydrated snapshot catalog: {} entries, {total_storage_used} bytes",
            catalog.len()
        );

        Ok(Self {
            store,
            config,
            catalog,
            total_storage_used,
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    #[must_use]
    pub fn total_storage_used(&self) -> u64 {
        self.total_storage_used
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    #[must_use]
    pub fn get_snapshot(&self, id: &str) -> Option<&PersistedSnapshot> {
        self.catalog.get(id)
    }

    /// All entries, newest first
    #[must_use]
    pub fn list_snapshots(&self) -> Vec<&PersistedSnapshot> {
        let mut entries: Vec<&PersistedSnapshot> = self.catalog.values().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    /// Record a snapshot for an accepted decision. Returns `None` when the decision
    /// does not ask for one.
    pub fn create_snapshot(
        &mut self,
        decision: &ProtectionDecision,
        files: &[FileContext],
        now: i64,
    ) -> Result<Option<Admission>> {
        if !decision.create_snapshot {
            return Ok(None);
        }

        let intent = intent_from_decision(decision, files, now);
        self.store_snapshot(intent).map(Some)
    }

    /// Admit an intent, evicting oldest entries until both bounds hold
    pub fn store_snapshot(&mut self, intent: SnapshotIntent) -> Result<Admission> {
        let candidate_size = intent.total_size();
        if candidate_size > self.config.max_storage_bytes {
            return Err(Error::StorageExceeded {
                required: candidate_size,
                budget: self.config.max_storage_bytes,
            });
        }

        let mut staged = self.catalog.clone();
        let mut staged_total = self.total_storage_used;
        let mut evicted = Vec::new();
        while !staged.is_empty() && !self.admits(&staged, staged_total, candidate_size) {
            match evict_oldest(&mut staged) {
                Some(snapshot) => {
                    staged_total = staged_total.saturating_sub(snapshot.total_size);
                    evicted.push(snapshot);
                }
                None => break,
            }
        }

        let files: Vec<&str> = intent
            .files
            .iter()
            .filter(|(_, f)| !f.is_binary)
            .map(|(path, _)| path.as_str())
            .collect();

        let snapshot = PersistedSnapshot {
            id: intent.id.clone(),
            name: intent.name.clone(),
            timestamp: intent.timestamp,
            file_count: files.len(),
            total_size: candidate_size,
            checksum: path_checksum(files.iter().copied()),
            metadata: intent.metadata,
            recoverable: true,
        };

        staged.insert(snapshot.id.clone(), snapshot.clone());
        self.commit(staged, staged_total + snapshot.total_size)?;

        for snapshot in &evicted {
            log::info!("Evicted snapshot {} ({})", snapshot.name, snapshot.id);
        }
        log::info!(
            "Stored snapshot {} ({} files, {} bytes, {} evicted)",
            snapshot.name,
            snapshot.file_count,
            snapshot.total_size,
            evicted.len()
        );

        Ok(Admission { snapshot, evicted })
    }

    fn admits(
        &self,
        catalog: &HashMap<String, PersistedSnapshot>,
        used: u64,
        candidate_size: u64,
    ) -> bool {
        catalog.len() < self.config.max_snapshots
            && used + candidate_size <= self.config.max_storage_bytes
    }

    /// Remove entries older than the retention window, regardless of bounds
    pub fn cleanup(&mut self, now: i64) -> Result<Vec<PersistedSnapshot>> {
        let cutoff = now.saturating_sub(i64::from(self.config.retention_days) * MS_PER_DAY);
        let expired: Vec<String> = self
            .catalog
            .values()
            .filter(|s| s.timestamp < cutoff)
            .map(|s| s.id.clone())
            .collect();

        if expired.is_empty() {
            return Ok(Vec::new());
        }

        let mut staged = self.catalog.clone();
        let mut staged_total = self.total_storage_used;
        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(snapshot) = staged.remove(&id) {
                staged_total = staged_total.saturating_sub(snapshot.total_size);
                removed.push(snapshot);
            }
        }

        self.commit(staged, staged_total)?;
        log::info!("Removed {} expired snapshots", removed.len());

        removed.sort_by_key(|s| s.timestamp);
        Ok(removed)
    }

    /// Delete one entry on explicit user request
    pub fn delete_snapshot(&mut self, id: &str) -> Result<PersistedSnapshot> {
        let mut staged = self.catalog.clone();
        let snapshot = staged
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("snapshot {id}")))?;
        let staged_total = self.total_storage_used.saturating_sub(snapshot.total_size);
        self.commit(staged, staged_total)?;
        Ok(snapshot)
    }

    /// Stamp `lastProtectedAt` on an entry
    pub fn mark_protected(&mut self, id: &str, now: i64) -> Result<()> {
        let mut staged = self.catalog.clone();
        let snapshot = staged
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("snapshot {id}")))?;
        snapshot.metadata.last_protected_at = Some(now);
        self.commit(staged, self.total_storage_used)
    }

    /// Capability check only; the filesystem is not touched here
    pub fn restore_snapshot(&self, id: &str) -> Result<&PersistedSnapshot> {
        let snapshot = self
            .catalog
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("snapshot {id}")))?;
        if !snapshot.recoverable {
            return Err(Error::InvalidInput(format!(
                "snapshot {id} is not recoverable"
            )));
        }
        Ok(snapshot)
    }

    #[must_use]
    pub fn can_restore(&self, id: &str) -> bool {
        self.restore_snapshot(id).is_ok()
    }

    /// Write `catalog` to the store, then make it current. On a failed write the
    /// in-memory catalog is left untouched.
    fn commit(&mut self, catalog: HashMap<String, PersistedSnapshot>, used: u64) -> Result<()> {
        let mut entries: Vec<&PersistedSnapshot> = catalog.values().collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        self.store.set_as(CATALOG_KEY, &entries)?;

        self.catalog = catalog;
        self.total_storage_used = used;
        Ok(())
    }
}

fn evict_oldest(catalog: &mut HashMap<String, PersistedSnapshot>) -> Option<PersistedSnapshot> {
    let oldest_id = catalog
        .values()
        .min_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
        .map(|s| s.id.clone())?;
    catalog.remove(&oldest_id)
}
