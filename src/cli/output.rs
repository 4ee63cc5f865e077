//! Output formatting for CLI

use crate::models::{ConflictKind, PersistedSnapshot, ProtectionDecision};
use crate::services::coordinator::RestoreOutcome;
use crate::services::format::{format_size, format_timestamp};
use std::fmt::Write;

/// Snapshot catalog as a text table, newest first
#[must_use]
pub fn format_snapshot_list(snapshots: &[&PersistedSnapshot]) -> String {
    if snapshots.is_empty() {
        return "No snapshots found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<36}  {:<23}  {:>6}  {:>10}  NAME",
        "ID", "CREATED", "FILES", "SIZE"
    );
    for s in snapshots {
        let _ = writeln!(
            out,
            "{:<36}  {:<23}  {:>6}  {:>10}  {}",
            s.id,
            format_timestamp(s.timestamp),
            s.file_count,
            format_size(s.total_size),
            s.name
        );
    }

    let total: u64 = snapshots.iter().map(|s| s.total_size).sum();
    let _ = writeln!(
        out,
        "\n{} snapshots, {} stored",
        snapshots.len(),
        format_size(total)
    );
    out
}

/// Snapshot catalog as JSON
#[must_use]
pub fn format_snapshot_list_json(snapshots: &[&PersistedSnapshot]) -> String {
    let output = serde_json::json!({
        "count": snapshots.len(),
        "totalSize": snapshots.iter().map(|s| s.total_size).sum::<u64>(),
        "snapshots": snapshots,
    });

    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

#[must_use]
pub fn format_decision(decision: &ProtectionDecision) -> String {
    let mut out = String::new();
    let verdict = match (decision.create_snapshot, decision.show_notification) {
        (true, true) => "snapshot and notify",
        (true, false) => "snapshot silently",
        (false, true) => "notify only",
        (false, false) => "no action",
    };

    let _ = writeln!(out, "Decision:   {verdict}");
    let reasons: Vec<&str> = decision.reasons.iter().map(|r| r.as_str()).collect();
    let _ = writeln!(out, "Reasons:    {}", reasons.join(", "));
    let _ = writeln!(out, "Confidence: {:.2}", decision.confidence);
    let _ = writeln!(out, "Summary:    {}", decision.summary);
    out
}

#[must_use]
pub fn format_decision_json(decision: &ProtectionDecision) -> String {
    serde_json::to_string_pretty(decision).unwrap_or_else(|_| "{}".to_string())
}

#[must_use]
pub fn format_restore_outcome(snapshot_id: &str, outcome: &RestoreOutcome) -> String {
    let mut out = String::new();
    match outcome {
        RestoreOutcome::Restored { files_written } => {
            let _ = writeln!(
                out,
                "Restored {} files from {snapshot_id}",
                files_written.len()
            );
            for file in files_written {
                let _ = writeln!(out, "  {file}");
            }
        }
        RestoreOutcome::Previewed { conflicts } if conflicts.is_empty() => {
            let _ = writeln!(out, "Workspace already matches {snapshot_id}");
        }
        RestoreOutcome::Previewed { conflicts } => {
            let _ = writeln!(
                out,
                "{} files differ from {snapshot_id}:",
                conflicts.len()
            );
            for c in conflicts {
                let marker = match c.kind {
                    ConflictKind::Added => 'A',
                    ConflictKind::Modified => 'M',
                };
                let current = c
                    .current_size
                    .map_or_else(|| "-".to_string(), format_size);
                let _ = writeln!(
                    out,
                    "  {marker} {}  (snapshot {}, current {current})",
                    c.file,
                    format_size(c.snapshot_size)
                );
            }
        }
        RestoreOutcome::Cancelled => {
            let _ = writeln!(out, "Restore of {snapshot_id} cancelled; nothing written");
        }
    }
    out
}
