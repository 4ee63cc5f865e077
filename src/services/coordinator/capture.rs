//! Batched, memory-bounded file capture.
//!
//! Files are pre-stat'd, then grouped into batches bounded by both a file count and
//! a byte ceiling. Each batch is read in parallel, handed to a `ContentSink`, and
//! dropped before the next one is filled.

use super::walk::{WalkEntry, ensure_within_root, normalize_relative};
use crate::io::snapshot::{ContentRecord, SnapshotContentWriter};
use crate::models::{ErrorItem, IntentFile, StoredContent};
use crate::services::context_builder::is_binary_path;
use crate::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureLimits {
    /// Hard walk limit on the number of files
    pub max_files: usize,
    /// Hard walk limit on the cumulative size of walked files
    pub max_total_bytes: u64,
    /// Larger files are skipped, not fatal
    pub max_file_bytes: u64,
    pub batch_size: usize,
    /// Soft per-batch ceiling; a batch is flushed before it would be exceeded
    pub batch_memory_bytes: u64,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_files: 10_000,
            max_total_bytes: 200 * 1024 * 1024,
            max_file_bytes: 5 * 1024 * 1024,
            batch_size: 100,
            batch_memory_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Receives captured batches in order
pub trait ContentSink {
    fn write_batch(&mut self, records: &[ContentRecord]) -> std::io::Result<()>;
}

impl ContentSink for SnapshotContentWriter {
    fn write_batch(&mut self, records: &[ContentRecord]) -> std::io::Result<()> {
        SnapshotContentWriter::write_batch(self, records)
    }
}

/// In-memory sink retaining every batch; used for previews and tests
#[derive(Debug, Default)]
pub struct MemoryContentSink {
    pub records: Vec<ContentRecord>,
    pub batch_sizes: Vec<usize>,
}

impl ContentSink for MemoryContentSink {
    fn write_batch(&mut self, records: &[ContentRecord]) -> std::io::Result<()> {
        self.batch_sizes.push(records.len());
        self.records.extend_from_slice(records);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CaptureReport {
    pub files: BTreeMap<String, IntentFile>,
    pub skipped: Vec<String>,
    pub errors: Vec<ErrorItem>,
    pub batches: usize,
    pub total_bytes: u64,
}

/// Stat an explicit file list. Missing or unreadable entries are logged and skipped.
#[must_use]
pub fn stat_candidates(root: &Path, paths: &[String]) -> (Vec<WalkEntry>, Vec<ErrorItem>) {
    let mut entries = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();

    for path in paths {
        let relative = match ensure_within_root(path) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping {path}: {e}");
                errors.push(ErrorItem {
                    path: path.clone(),
                    code: "EINVAL".to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let abs_path = root.join(&relative);
        match fs::symlink_metadata(&abs_path) {
            Ok(m) if m.is_file() => entries.push(WalkEntry {
                rel_path: normalize_relative(&relative),
                abs_path,
                size_bytes: m.len(),
            }),
            Ok(_) => log::debug!("Skipping non-regular file {path}"),
            Err(e) => {
                log::warn!("Failed to stat {path}: {e}");
                errors.push(ErrorItem::from_io(path, &e));
            }
        }
    }

    (entries, errors)
}

/// Read `entries` in bounded batches and stream them into `sink`.
/// Per-file failures are recorded; sink failures abort the capture.
pub fn capture_batched<S: ContentSink>(
    entries: Vec<WalkEntry>,
    pre_save: &HashMap<String, String>,
    limits: &CaptureLimits,
    sink: &mut S,
) -> Result<CaptureReport> {
    let mut report = CaptureReport::default();
    let batch_size = limits.batch_size.max(1);
    let mut batch: Vec<WalkEntry> = Vec::with_capacity(batch_size);
    let mut batch_bytes = 0u64;

    for entry in entries {
        if is_binary_path(&entry.rel_path) {
            log::trace!("Skipping binary file {}", entry.rel_path);
            report.skipped.push(entry.rel_path);
            continue;
        }
        if entry.size_bytes > limits.max_file_bytes {
            log::warn!(
                "Skipping {}: {} bytes exceeds per-file limit of {}",
                entry.rel_path,
                entry.size_bytes,
                limits.max_file_bytes
            );
            report.skipped.push(entry.rel_path);
            continue;
        }

        let would_overflow = batch_bytes.saturating_add(entry.size_bytes) > limits.batch_memory_bytes;
        if !batch.is_empty() && (batch.len() >= batch_size || would_overflow) {
            flush_batch(&mut batch, pre_save, sink, &mut report)?;
            batch_bytes = 0;
        }

        batch_bytes = batch_bytes.saturating_add(entry.size_bytes);
        batch.push(entry);
    }

    if !batch.is_empty() {
        flush_batch(&mut batch, pre_save, sink, &mut report)?;
    }

    log::debug!(
        "Captured {} files in {} batches ({} skipped, {} errors)",
        report.files.len(),
        report.batches,
        report.skipped.len(),
        report.errors.len()
    );
    Ok(report)
}

fn flush_batch<S: ContentSink>(
    batch: &mut Vec<WalkEntry>,
    pre_save: &HashMap<String, String>,
    sink: &mut S,
    report: &mut CaptureReport,
) -> Result<()> {
    let reads: Vec<std::io::Result<String>> = batch
        .par_iter()
        .map(|entry| fs::read_to_string(&entry.abs_path))
        .collect();

    let mut records = Vec::with_capacity(batch.len());
    for (entry, read) in batch.drain(..).zip(reads) {
        let text = match read {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Failed to read {}: {e}", entry.rel_path);
                report.errors.push(ErrorItem::from_io(&entry.rel_path, &e));
                continue;
            }
        };

        let size_bytes = text.len() as u64;
        let stored = StoredContent::pack(text, pre_save.get(&entry.rel_path).map(String::as_str));
        let enveloped = stored.is_envelope();
        records.push(ContentRecord {
            path: entry.rel_path.clone(),
            stored: stored.encode()?,
            size_bytes,
            enveloped: Some(enveloped),
        });

        report.total_bytes += size_bytes;
        report.files.insert(
            entry.rel_path,
            IntentFile {
                size_bytes,
                is_binary: false,
                content: None,
            },
        );
    }

    sink.write_batch(&records)?;
    report.batches += 1;
    Ok(())
}
