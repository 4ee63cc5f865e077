//! Operation coordinator: tracked, dependency-gated operations that capture and
//! restore snapshots against the real workspace.
//!
//! Invariants:
//!
//! - An operation moves `pending -> running -> {completed | failed}` and never
//!   leaves a terminal state. `end_time` is stamped only on that last transition.
//! - An operation runs only once every dependency has completed. Until then it
//!   stays queued as `pending`; a failed dependency fails its dependents.
//! - Creation and restore both mark their operation `failed` and return `Err` on
//!   any failure. No workspace-memory pointer is written for a failed creation.

pub mod capture;
pub mod restore;
pub mod walk;

use crate::io::snapshot::SnapshotContentWriter;
use crate::io::store::{KeyValueStore, KeyValueStoreExt, WORKSPACE_MEMORY_KEY};
use crate::models::{
    Conflict, Operation, OperationProgress, OperationStatus, ProtectionDecision, SnapshotIntent,
    SnapshotTrigger, WorkspaceMemory,
};
use crate::services::orchestrator::{
    SnapshotOrchestrator, StorageConfig, metadata_for, snapshot_name,
};
use crate::{Error, Result};
use capture::{CaptureLimits, capture_batched, stat_candidates};
use restore::{
    ConflictResolver, detect_conflicts, load_restore_files, select_resolved, write_restored_files,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walk::{WorkspaceWalker, collect_workspace_files};

/// Observer for operation progress milestones
pub type ProgressNotifier = Arc<dyn Fn(&OperationProgress) + Send + Sync>;

/// Workspace-relative directory holding snapshot content files
pub const DEFAULT_STORAGE_DIR: &str = ".snapback/snapshots";

#[derive(Clone)]
pub struct CoordinatorOptions {
    pub capture: CaptureLimits,
    pub storage: StorageConfig,
    pub storage_dir: String,
    pub progress_notifier: Option<ProgressNotifier>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            capture: CaptureLimits::default(),
            storage: StorageConfig::default(),
            storage_dir: DEFAULT_STORAGE_DIR.to_string(),
            progress_notifier: None,
        }
    }
}

impl std::fmt::Debug for CoordinatorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorOptions")
            .field("capture", &self.capture)
            .field("storage", &self.storage)
            .field("storage_dir", &self.storage_dir)
            .field("progress_notifier", &self.progress_notifier.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureMode {
    /// Caller-supplied workspace-relative paths, trusted as-is
    Incremental(Vec<String>),
    /// Ignore-aware walk of the whole workspace
    FullWorkspace,
}

#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub mode: CaptureMode,
    pub name: Option<String>,
    pub trigger: Option<SnapshotTrigger>,
    pub decision: Option<ProtectionDecision>,
    /// Editor content before the save, keyed by relative path
    pub pre_save: HashMap<String, String>,
}

impl SnapshotRequest {
    #[must_use]
    pub fn incremental(paths: Vec<String>) -> Self {
        Self {
            mode: CaptureMode::Incremental(paths),
            name: None,
            trigger: None,
            decision: None,
            pre_save: HashMap::new(),
        }
    }

    #[must_use]
    pub fn full_workspace() -> Self {
        Self {
            mode: CaptureMode::FullWorkspace,
            ..Self::incremental(Vec::new())
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: SnapshotTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn with_decision(mut self, decision: ProtectionDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    #[must_use]
    pub fn with_pre_save(mut self, pre_save: HashMap<String, String>) -> Self {
        self.pre_save = pre_save;
        self
    }

    fn resolved_trigger(&self) -> SnapshotTrigger {
        self.trigger.unwrap_or_else(|| match &self.decision {
            Some(decision) => SnapshotTrigger::from_reasons(&decision.reasons),
            None => SnapshotTrigger::Manual,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Compute conflicts first and consult the resolver before writing
    pub dry_run: bool,
    /// Restrict the restore to these relative paths
    pub files: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    Restored { files_written: Vec<String> },
    /// Dry run without a resolver, or nothing differs
    Previewed { conflicts: Vec<Conflict> },
    /// The resolver returned no resolution; nothing was written
    Cancelled,
}

impl RestoreOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, RestoreOutcome::Cancelled)
    }
}

pub struct OperationCoordinator {
    root: PathBuf,
    options: CoordinatorOptions,
    operations: HashMap<String, Operation>,
    orchestrator: SnapshotOrchestrator,
    store: Arc<dyn KeyValueStore>,
    workspace_memory: WorkspaceMemory,
    resolver: Option<Box<dyn ConflictResolver + Send>>,
}

impl std::fmt::Debug for OperationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationCoordinator")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("operations", &self.operations.len())
            .field("orchestrator", &self.orchestrator)
            .field("workspace_memory", &self.workspace_memory)
            .finish_non_exhaustive()
    }
}

impl OperationCoordinator {
    pub fn new<P: AsRef<Path>>(
        root: P,
        store: Arc<dyn KeyValueStore>,
        options: CoordinatorOptions,
    ) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Workspace is not a directory: {}",
                root.display()
            )));
        }

        let orchestrator = SnapshotOrchestrator::open(store.clone(), options.storage)?;
        let workspace_memory = store.get_or(WORKSPACE_MEMORY_KEY, WorkspaceMemory::default())?;

        Ok(Self {
            root: root.to_path_buf(),
            options,
            operations: HashMap::new(),
            orchestrator,
            store,
            workspace_memory,
            resolver: None,
        })
    }

    #[must_use]
    pub fn with_conflict_resolver(mut self, resolver: Box<dyn ConflictResolver + Send>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn set_conflict_resolver(&mut self, resolver: Option<Box<dyn ConflictResolver + Send>>) {
        self.resolver = resolver;
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn orchestrator(&self) -> &SnapshotOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub fn workspace_memory(&self) -> &WorkspaceMemory {
        &self.workspace_memory
    }

    // ----- operation registry -------------------------------------------------

    /// Register an operation. It starts running immediately when its dependencies
    /// are complete, otherwise it stays queued as `pending`.
    pub fn start_operation(
        &mut self,
        id: &str,
        name: &str,
        dependencies: Vec<String>,
        now: i64,
    ) -> Result<OperationStatus> {
        if self.operations.contains_key(id) {
            return Err(Error::InvalidInput(format!("operation {id} already exists")));
        }

        self.operations.insert(
            id.to_string(),
            Operation {
                id: id.to_string(),
                name: name.to_string(),
                status: OperationStatus::Pending,
                progress: 0.0,
                start_time: now,
                end_time: None,
                dependencies,
            },
        );

        if self.has_failed_dependency(id) {
            self.set_terminal(id, OperationStatus::Failed, now);
        } else if self.can_start_operation(id) {
            self.set_running(id);
        } else {
            log::debug!("Operation {id} queued behind {:?}", self.pending_dependencies(id));
        }

        Ok(self.operations[id].status)
    }

    /// True when the operation exists and every dependency has completed
    #[must_use]
    pub fn can_start_operation(&self, id: &str) -> bool {
        self.operations.get(id).is_some_and(|op| {
            op.dependencies.iter().all(|dep| {
                self.operations
                    .get(dep)
                    .is_some_and(|d| d.status == OperationStatus::Completed)
            })
        })
    }

    /// Dependencies of `id` that have not completed yet
    #[must_use]
    pub fn pending_dependencies(&self, id: &str) -> Vec<String> {
        self.operations.get(id).map_or_else(Vec::new, |op| {
            op.dependencies
                .iter()
                .filter(|dep| {
                    self.operations
                        .get(*dep)
                        .is_none_or(|d| d.status != OperationStatus::Completed)
                })
                .cloned()
                .collect()
        })
    }

    pub fn update_operation_progress(&mut self, id: &str, progress: f64) -> Result<()> {
        let op = self
            .operations
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("operation {id}")))?;
        op.progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 100.0)
        };
        Ok(())
    }

    pub fn update_operation_status(
        &mut self,
        id: &str,
        status: OperationStatus,
        now: i64,
    ) -> Result<()> {
        let current = self
            .operations
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("operation {id}")))?
            .status;

        if current == status {
            return Ok(());
        }
        if current.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "operation {id} is already {current}"
            )));
        }

        match status {
            OperationStatus::Pending => Err(Error::InvalidInput(format!(
                "operation {id} cannot return to pending"
            ))),
            OperationStatus::Running => {
                if !self.can_start_operation(id) {
                    return Err(Error::DependencyNotSatisfied {
                        operation: id.to_string(),
                        pending: self.pending_dependencies(id),
                    });
                }
                self.set_running(id);
                Ok(())
            }
            OperationStatus::Completed | OperationStatus::Failed => {
                self.set_terminal(id, status, now);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get_operation(&self, id: &str) -> Option<&Operation> {
        self.operations.get(id)
    }

    /// All operations in start order
    #[must_use]
    pub fn operations(&self) -> Vec<&Operation> {
        let mut ops: Vec<&Operation> = self.operations.values().collect();
        ops.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        ops
    }

    /// Drop terminal operations nothing else depends on
    pub fn prune_finished(&mut self) -> usize {
        let referenced: std::collections::HashSet<String> = self
            .operations
            .values()
            .filter(|op| !op.status.is_terminal())
            .flat_map(|op| op.dependencies.iter().cloned())
            .collect();
        let before = self.operations.len();
        self.operations
            .retain(|id, op| !op.status.is_terminal() || referenced.contains(id));
        before - self.operations.len()
    }

    fn has_failed_dependency(&self, id: &str) -> bool {
        self.operations.get(id).is_some_and(|op| {
            op.dependencies.iter().any(|dep| {
                self.operations
                    .get(dep)
                    .is_some_and(|d| d.status == OperationStatus::Failed)
            })
        })
    }

    fn set_running(&mut self, id: &str) {
        if let Some(op) = self.operations.get_mut(id) {
            op.status = OperationStatus::Running;
            log::debug!("Operation {} ({}) running", op.id, op.name);
        }
    }

    fn set_terminal(&mut self, id: &str, status: OperationStatus, now: i64) {
        if let Some(op) = self.operations.get_mut(id) {
            op.status = status;
            op.end_time = Some(now.max(op.start_time));
            if status == OperationStatus::Completed {
                op.progress = 100.0;
            }
            log::debug!("Operation {} ({}) {status}", op.id, op.name);
        }
        self.settle_dependents(now);
    }

    /// Promote queued operations whose dependencies completed; fail those whose
    /// dependencies failed. Repeats until nothing changes.
    fn settle_dependents(&mut self, now: i64) {
        loop {
            let queued: Vec<String> = self
                .operations
                .values()
                .filter(|op| op.status == OperationStatus::Pending)
                .map(|op| op.id.clone())
                .collect();

            let mut changed = false;
            for id in queued {
                if self.has_failed_dependency(&id) {
                    if let Some(op) = self.operations.get_mut(&id) {
                        op.status = OperationStatus::Failed;
                        op.end_time = Some(now.max(op.start_time));
                        log::debug!("Operation {id} failed: dependency failed");
                    }
                    changed = true;
                } else if self.can_start_operation(&id) {
                    self.set_running(&id);
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }
    }

    fn report_progress(&mut self, id: &str, progress: f64, message: &str) -> Result<()> {
        self.update_operation_progress(id, progress)?;
        log::debug!("Operation {id}: {progress}% {message}");
        if let Some(notifier) = &self.options.progress_notifier {
            notifier(&OperationProgress {
                operation_id: id.to_string(),
                progress,
                message: message.to_string(),
            });
        }
        Ok(())
    }

    fn finish_operation<T>(&mut self, id: &str, result: Result<T>, now: i64) -> Result<T> {
        match result {
            Ok(value) => {
                self.update_operation_status(id, OperationStatus::Completed, now)?;
                Ok(value)
            }
            Err(e) => {
                log::warn!("Operation {id} failed: {e}");
                if let Err(status_err) =
                    self.update_operation_status(id, OperationStatus::Failed, now)
                {
                    log::warn!("Could not mark {id} failed: {status_err}");
                }
                Err(e)
            }
        }
    }

    // ----- snapshot creation --------------------------------------------------

    /// Capture files and persist a snapshot; returns the new snapshot id
    pub fn coordinate_snapshot_creation(
        &mut self,
        request: SnapshotRequest,
        now: i64,
    ) -> Result<String> {
        let op_id = format!("snapshot-create-{}", uuid::Uuid::new_v4());
        self.start_operation(&op_id, "Create snapshot", Vec::new(), now)?;
        let result = self.run_creation(&op_id, request, now);
        self.finish_operation(&op_id, result, now)
    }

    fn run_creation(&mut self, op_id: &str, request: SnapshotRequest, now: i64) -> Result<String> {
        self.report_progress(op_id, 10.0, "Collecting files")?;

        let entries = match &request.mode {
            CaptureMode::Incremental(paths) => {
                let (entries, errors) = stat_candidates(&self.root, paths);
                if !errors.is_empty() {
                    log::warn!("{} requested files could not be stat'd", errors.len());
                }
                entries
            }
            CaptureMode::FullWorkspace => {
                let walker = WorkspaceWalker::new(&self.root)?;
                collect_workspace_files(walker, &self.options.capture)?.entries
            }
        };

        self.report_progress(op_id, 30.0, &format!("Capturing {} files", entries.len()))?;

        let snapshot_id = uuid::Uuid::new_v4().to_string();
        let content_rel = format!("{}/{snapshot_id}.parquet", self.options.storage_dir);
        let content_path = self.root.join(&content_rel);

        let mut writer = SnapshotContentWriter::try_new(&content_path, &snapshot_id, now)?;
        let report = match capture_batched(
            entries,
            &request.pre_save,
            &self.options.capture,
            &mut writer,
        ) {
            Ok(report) if report.files.is_empty() => {
                writer.abandon();
                return Err(Error::EmptyCapture);
            }
            Ok(report) => report,
            Err(e) => {
                writer.abandon();
                return Err(e);
            }
        };
        writer.finish()?;

        self.report_progress(op_id, 85.0, "Persisting snapshot")?;

        let trigger = request.resolved_trigger();
        let mut metadata = metadata_for(request.decision.as_ref(), trigger);
        metadata.files = report.files.keys().cloned().collect();
        metadata.content_path = Some(content_rel);

        let intent = SnapshotIntent {
            id: snapshot_id.clone(),
            name: request
                .name
                .clone()
                .unwrap_or_else(|| snapshot_name(trigger, now)),
            trigger,
            metadata,
            files: report.files,
            timestamp: now,
        };

        let admission = match self.orchestrator.store_snapshot(intent) {
            Ok(admission) => admission,
            Err(e) => {
                remove_content_file(&content_path);
                return Err(e);
            }
        };
        for evicted in &admission.evicted {
            self.remove_contents_of(evicted);
        }

        self.report_progress(op_id, 90.0, "Updating workspace memory")?;

        let memory = WorkspaceMemory {
            last_snapshot_id: Some(snapshot_id.clone()),
            last_snapshot_at: Some(now),
            snapshots_created: self.workspace_memory.snapshots_created + 1,
        };
        if let Err(e) = self.store.set_as(WORKSPACE_MEMORY_KEY, &memory) {
            self.withdraw_snapshot(&admission.snapshot);
            return Err(e);
        }
        self.workspace_memory = memory;

        self.report_progress(op_id, 100.0, "Snapshot created")?;
        log::info!(
            "Created snapshot {} with {} files",
            admission.snapshot.name,
            admission.snapshot.file_count
        );
        Ok(snapshot_id)
    }

    // ----- restore ------------------------------------------------------------

    pub fn restore_to_snapshot(
        &mut self,
        snapshot_id: &str,
        options: &RestoreOptions,
        now: i64,
    ) -> Result<RestoreOutcome> {
        let op_id = format!("snapshot-restore-{}", uuid::Uuid::new_v4());
        self.start_operation(&op_id, "Restore snapshot", Vec::new(), now)?;
        let result = self.run_restore(&op_id, snapshot_id, options, now);
        self.finish_operation(&op_id, result, now)
    }

    fn run_restore(
        &mut self,
        op_id: &str,
        snapshot_id: &str,
        options: &RestoreOptions,
        now: i64,
    ) -> Result<RestoreOutcome> {
        let snapshot = self.orchestrator.restore_snapshot(snapshot_id)?;
        let content_rel = snapshot
            .metadata
            .content_path
            .clone()
            .ok_or_else(|| Error::NotFound(format!("stored contents of {snapshot_id}")))?;

        self.report_progress(op_id, 10.0, "Loading snapshot")?;

        let mut files = load_restore_files(&self.root.join(content_rel))?;
        if let Some(only) = &options.files {
            files.retain(|f| only.contains(&f.path));
        }

        self.report_progress(op_id, 30.0, "Comparing with workspace")?;

        let targets = if options.dry_run {
            let conflicts = detect_conflicts(&self.root, &files);
            if conflicts.is_empty() {
                return Ok(RestoreOutcome::Previewed { conflicts });
            }

            let Some(resolver) = self.resolver.as_mut() else {
                return Ok(RestoreOutcome::Previewed { conflicts });
            };

            match resolver.resolve_conflicts(&conflicts) {
                Some(resolutions) => select_resolved(&files, &resolutions),
                None => {
                    log::info!("Restore of {snapshot_id} cancelled");
                    return Ok(RestoreOutcome::Cancelled);
                }
            }
        } else {
            files.iter().collect()
        };

        self.report_progress(op_id, 85.0, &format!("Writing {} files", targets.len()))?;
        let files_written = write_restored_files(&self.root, &targets)?;
        self.orchestrator.mark_protected(snapshot_id, now)?;

        self.report_progress(op_id, 100.0, "Restore complete")?;
        log::info!(
            "Restored {} files from snapshot {snapshot_id}",
            files_written.len()
        );
        Ok(RestoreOutcome::Restored { files_written })
    }

    // ----- catalog maintenance ------------------------------------------------

    /// Delete a snapshot and its stored contents
    pub fn delete_snapshot(&mut self, id: &str) -> Result<()> {
        let removed = self.orchestrator.delete_snapshot(id)?;
        self.remove_contents_of(&removed);
        Ok(())
    }

    /// Apply the retention window; returns how many snapshots were removed
    pub fn cleanup(&mut self, now: i64) -> Result<usize> {
        let removed = self.orchestrator.cleanup(now)?;
        for snapshot in &removed {
            self.remove_contents_of(snapshot);
        }
        Ok(removed.len())
    }

    /// Take back a snapshot whose creation failed after admission. When the catalog
    /// cannot be rewritten the entry and its contents both stay, so it remains restorable.
    fn withdraw_snapshot(&mut self, snapshot: &crate::models::PersistedSnapshot) {
        match self.orchestrator.delete_snapshot(&snapshot.id) {
            Ok(_) => self.remove_contents_of(snapshot),
            Err(e) => log::warn!("Could not withdraw snapshot {}: {e}", snapshot.id),
        }
    }

    fn remove_contents_of(&self, snapshot: &crate::models::PersistedSnapshot) {
        if let Some(rel) = &snapshot.metadata.content_path {
            remove_content_file(&self.root.join(rel));
        }
    }
}

fn remove_content_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::trace!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {e}", path.display()),
    }
}
