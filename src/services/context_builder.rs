//! Build a save context from raw change events plus detector output

use crate::models::{
    DetectionEngineResult, FileChangeEvent, FileChangeType, FileContext, SaveContext,
};
use crate::services::decision::validate_context;
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Extensions whose contents are never treated as text
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "pdf", "zip", "gz", "tgz",
    "tar", "bz2", "xz", "7z", "rar", "jar", "war", "class", "exe", "dll", "so", "dylib", "o",
    "a", "lib", "bin", "wasm", "pyc", "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "mov",
    "avi", "wav", "flac", "ogg", "webm", "sqlite", "db",
];

/// Trailing segment after the last `.` of the file name, lowercased; empty if none
#[must_use]
pub fn file_extension(path: &str) -> String {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => name[idx + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

#[must_use]
pub fn is_binary_extension(extension: &str) -> bool {
    BINARY_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

#[must_use]
pub fn is_binary_path(path: &str) -> bool {
    is_binary_extension(&file_extension(path))
}

fn change_fingerprint(path: &str, size: u64, timestamp: Option<i64>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(size.to_le_bytes());
    hasher.update(timestamp.unwrap_or_default().to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Derive the per-file context for one event
#[must_use]
pub fn file_context_from_event(event: &FileChangeEvent) -> FileContext {
    let extension = file_extension(&event.path);
    let size_bytes = match event.change_type {
        FileChangeType::Deleted => 0,
        _ => event.size_bytes.unwrap_or(0),
    };

    FileContext {
        path: event.path.clone(),
        is_binary: is_binary_extension(&extension),
        extension,
        size_bytes,
        is_new: event.change_type == FileChangeType::Created,
        prev_hash: event
            .previous_size
            .map(|prev| change_fingerprint(&event.path, prev, None)),
        next_hash: change_fingerprint(&event.path, size_bytes, event.timestamp),
    }
}

/// Accumulates change events; a later event for the same path replaces the earlier one
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    events: BTreeMap<String, FileChangeEvent>,
    order: Vec<String>,
}

impl ContextBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, event: FileChangeEvent) -> &mut Self {
        if !self.events.contains_key(&event.path) {
            self.order.push(event.path.clone());
        }
        self.events.insert(event.path.clone(), event);
        self
    }

    pub fn add_events<I: IntoIterator<Item = FileChangeEvent>>(&mut self, events: I) -> &mut Self {
        for event in events {
            self.add_event(event);
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Files in first-seen order
    #[must_use]
    pub fn file_contexts(&self) -> Vec<FileContext> {
        self.order
            .iter()
            .filter_map(|path| self.events.get(path))
            .map(file_context_from_event)
            .collect()
    }

    /// Paths whose latest event was not a deletion
    #[must_use]
    pub fn live_paths(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|path| {
                self.events
                    .get(*path)
                    .is_some_and(|e| e.change_type != FileChangeType::Deleted)
            })
            .cloned()
            .collect()
    }

    /// Live paths whose contents a snapshot would keep
    #[must_use]
    pub fn capturable_paths(&self) -> Vec<String> {
        self.live_paths()
            .into_iter()
            .filter(|path| !is_binary_path(path))
            .collect()
    }

    /// Combine accumulated events with detector output into a validated context
    pub fn build(
        &self,
        repo_id: &str,
        detection: &DetectionEngineResult,
        now: i64,
    ) -> Result<SaveContext> {
        let context = SaveContext {
            repo_id: repo_id.to_string(),
            timestamp: now,
            files: self.file_contexts(),
            ai_detected: detection.ai.detected,
            ai_tool_name: detection.ai.tool_name.clone(),
            ai_confidence: detection.ai.confidence,
            session_id: detection.session.session_id.clone(),
            session_file_count: detection.session.file_count,
            session_duration_ms: detection.session.duration_ms,
            risk_score: detection.risk.score,
            burst_detected: detection.burst.detected,
            contains_critical_files: detection.critical.detected,
            critical_file_count: detection.critical.count,
        };
        validate_context(&context)?;
        Ok(context)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.order.clear();
    }
}
