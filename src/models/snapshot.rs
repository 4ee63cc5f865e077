//! Snapshot intents, catalog records and restore conflicts

use crate::models::DecisionReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What caused a snapshot to be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotTrigger {
    AiDetected,
    Burst,
    Auto,
    Manual,
}

impl SnapshotTrigger {
    /// Derive the trigger from the reasons attached to a decision
    #[must_use]
    pub fn from_reasons(reasons: &[DecisionReason]) -> Self {
        if reasons.contains(&DecisionReason::AiDetected) {
            SnapshotTrigger::AiDetected
        } else if reasons.contains(&DecisionReason::BurstPattern) {
            SnapshotTrigger::Burst
        } else {
            SnapshotTrigger::Auto
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotTrigger::AiDetected => "ai-detected",
            SnapshotTrigger::Burst => "burst",
            SnapshotTrigger::Auto => "auto",
            SnapshotTrigger::Manual => "manual",
        }
    }
}

impl std::fmt::Display for SnapshotTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file inside a snapshot intent. `content` is absent when the bytes were
/// streamed straight to the content store or never read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentFile {
    pub size_bytes: u64,
    pub is_binary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Descriptive data stored alongside a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub trigger: Option<SnapshotTrigger>,
    #[serde(default)]
    pub reasons: Vec<DecisionReason>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub risk_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_tool_name: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_protected_at: Option<i64>,
    /// Location of the captured contents, relative to the workspace root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
}

/// Request to persist a snapshot; never stored directly
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotIntent {
    pub id: String,
    pub files: BTreeMap<String, IntentFile>,
    pub name: String,
    pub trigger: SnapshotTrigger,
    pub metadata: SnapshotMetadata,
    pub timestamp: i64,
}

impl SnapshotIntent {
    /// Bytes of non-binary files; binary files never count against storage
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files
            .values()
            .filter(|f| !f.is_binary)
            .map(|f| f.size_bytes)
            .sum()
    }
}

/// Catalog entry owned by the snapshot orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub id: String,
    pub name: String,
    pub timestamp: i64,
    pub file_count: usize,
    pub total_size: u64,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
    pub recoverable: bool,
    pub checksum: String,
}

/// Stored form of a captured file. When the editor buffer before the save differs
/// from the bytes on disk both are kept, so the pair stays diffable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredContent {
    Plain(String),
    Envelope { content: String, previous: String },
}

#[derive(Serialize, Deserialize)]
struct EnvelopeRepr {
    content: String,
    #[serde(rename = "previousBlob")]
    previous_blob: String,
}

impl StoredContent {
    /// Pack current content, enveloping it with the pre-save text when they differ
    #[must_use]
    pub fn pack(content: String, pre_save: Option<&str>) -> Self {
        match pre_save {
            Some(previous) if previous != content => StoredContent::Envelope {
                content,
                previous: previous.to_string(),
            },
            _ => StoredContent::Plain(content),
        }
    }

    #[must_use]
    pub fn is_envelope(&self) -> bool {
        matches!(self, StoredContent::Envelope { .. })
    }

    /// Serialize to the string written to the content store
    pub fn encode(&self) -> crate::Result<String> {
        match self {
            StoredContent::Plain(text) => Ok(text.clone()),
            StoredContent::Envelope { content, previous } => {
                let repr = EnvelopeRepr {
                    content: content.clone(),
                    previous_blob: previous.clone(),
                };
                Ok(serde_json::to_string(&repr)?)
            }
        }
    }

    /// Decode a stored string. `enveloped` is `None` for records written before the
    /// envelope flag existed; those are sniffed instead.
    #[must_use]
    pub fn decode(raw: &str, enveloped: Option<bool>) -> Self {
        match enveloped {
            Some(false) => StoredContent::Plain(raw.to_string()),
            Some(true) | None => match serde_json::from_str::<EnvelopeRepr>(raw) {
                Ok(repr) => StoredContent::Envelope {
                    content: repr.content,
                    previous: repr.previous_blob,
                },
                Err(_) => StoredContent::Plain(raw.to_string()),
            },
        }
    }

    /// Text to write back on restore
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            StoredContent::Plain(text) => text,
            StoredContent::Envelope { content, .. } => content,
        }
    }

    #[must_use]
    pub fn into_content(self) -> String {
        match self {
            StoredContent::Plain(text) => text,
            StoredContent::Envelope { content, .. } => content,
        }
    }
}

/// Pointer to the most recent successful snapshot for this workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMemory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_snapshot_at: Option<i64>,
    #[serde(default)]
    pub snapshots_created: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    /// Present in the snapshot, absent on disk
    Added,
    /// Present in both with different content
    Modified,
}

/// Difference between a snapshotted file and the current workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub file: String,
    pub kind: ConflictKind,
    pub snapshot_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionChoice {
    UseSnapshot,
    KeepCurrent,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub file: String,
    pub resolution: ResolutionChoice,
}
