//! Data models for save contexts, decisions, snapshots, operations and notifications

pub mod context;
pub mod decision;
pub mod notification;
pub mod operation;
pub mod snapshot;

pub use context::{
    AiSignal, BurstSignal, CriticalFileSignal, DetectionEngineResult, FileChangeEvent,
    FileChangeType, FileContext, RiskSignal, SaveContext, SessionSignal,
};
pub use decision::{DecisionContextSummary, DecisionReason, ProtectionDecision};
pub use notification::{
    NotificationAction, NotificationState, NotificationType, Severity, UserNotification,
};
pub use operation::{Operation, OperationProgress, OperationStatus};
pub use snapshot::{
    Conflict, ConflictKind, ConflictResolution, IntentFile, PersistedSnapshot, ResolutionChoice,
    SnapshotIntent, SnapshotMetadata, SnapshotTrigger, StoredContent, WorkspaceMemory,
};

use serde::{Deserialize, Serialize};

/// Represents a per-file error encountered while scanning, reading or restoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorItem {
    pub path: String,
    pub code: String,
    pub message: String,
}

impl ErrorItem {
    #[must_use]
    pub fn from_io(path: &str, error: &std::io::Error) -> Self {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => "ENOENT",
            std::io::ErrorKind::PermissionDenied => "EACCES",
            std::io::ErrorKind::InvalidData => "EILSEQ",
            _ => "IO",
        };

        Self {
            path: path.to_string(),
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}
