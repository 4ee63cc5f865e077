//! Change events, per-file context and the aggregated save context

use serde::{Deserialize, Serialize};

/// Kind of change observed for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeType {
    Created,
    Modified,
    Deleted,
}

/// Raw change signal as reported by a file watcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEvent {
    pub path: String,
    #[serde(rename = "type")]
    pub change_type: FileChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_size: Option<u64>,
}

impl FileChangeEvent {
    #[must_use]
    pub fn new(path: impl Into<String>, change_type: FileChangeType) -> Self {
        Self {
            path: path.into(),
            change_type,
            timestamp: None,
            size_bytes: None,
            previous_size: None,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Per-file view inside one save context; identity is `path`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContext {
    pub path: String,
    pub extension: String,
    pub size_bytes: u64,
    pub is_new: bool,
    pub is_binary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    pub next_hash: String,
}

/// Everything the decision engine needs for one decision cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveContext {
    pub repo_id: String,
    pub timestamp: i64,
    pub files: Vec<FileContext>,
    pub ai_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_tool_name: Option<String>,
    pub ai_confidence: f64,
    pub session_id: String,
    pub session_file_count: u32,
    pub session_duration_ms: u64,
    pub risk_score: f64,
    pub burst_detected: bool,
    pub contains_critical_files: bool,
    pub critical_file_count: u32,
}

impl SaveContext {
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }
}

/// AI presence as reported by an upstream detector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSignal {
    pub detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstSignal {
    pub detected: bool,
    pub file_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalFileSignal {
    pub detected: bool,
    pub count: u32,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSignal {
    pub session_id: String,
    pub file_count: u32,
    pub duration_ms: u64,
}

/// Combined detector output handed to the context builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionEngineResult {
    #[serde(default)]
    pub ai: AiSignal,
    #[serde(default)]
    pub risk: RiskSignal,
    #[serde(default)]
    pub burst: BurstSignal,
    #[serde(default)]
    pub critical: CriticalFileSignal,
    #[serde(default)]
    pub session: SessionSignal,
}
