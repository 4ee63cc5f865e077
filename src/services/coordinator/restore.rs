//! Conflict detection and write-back for snapshot restore

use super::walk::ensure_within_root;
use crate::io::snapshot::read_snapshot_contents;
use crate::models::{Conflict, ConflictKind, ConflictResolution, ResolutionChoice, StoredContent};
use crate::Result;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Decides which conflicting files to take from the snapshot.
/// Returning `None` means the user cancelled the restore.
pub trait ConflictResolver {
    fn resolve_conflicts(&mut self, conflicts: &[Conflict]) -> Option<Vec<ConflictResolution>>;
}

/// Resolver that always prefers the snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferSnapshot;

impl ConflictResolver for PreferSnapshot {
    fn resolve_conflicts(&mut self, conflicts: &[Conflict]) -> Option<Vec<ConflictResolution>> {
        Some(
            conflicts
                .iter()
                .map(|c| ConflictResolution {
                    file: c.file.clone(),
                    resolution: ResolutionChoice::UseSnapshot,
                })
                .collect(),
        )
    }
}

/// One file ready to be written back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFile {
    pub path: String,
    pub content: String,
}

/// Load and unwrap every file stored for a snapshot
pub fn load_restore_files(content_file: &Path) -> Result<Vec<RestoreFile>> {
    let (meta, records) = read_snapshot_contents(content_file)?;
    log::debug!(
        "Loaded {} stored files for snapshot {}",
        records.len(),
        meta.snapshot_id
    );

    Ok(records
        .into_iter()
        .map(|record| RestoreFile {
            content: StoredContent::decode(&record.stored, record.enveloped).into_content(),
            path: record.path,
        })
        .collect())
}

/// Compare each snapshotted file against the workspace. Files already matching
/// produce no conflict.
#[must_use]
pub fn detect_conflicts(root: &Path, files: &[RestoreFile]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for file in files {
        let snapshot_size = file.content.len() as u64;
        let on_disk = root.join(&file.path);

        match fs::read(&on_disk) {
            Ok(current) if current == file.content.as_bytes() => {}
            Ok(current) => conflicts.push(Conflict {
                file: file.path.clone(),
                kind: ConflictKind::Modified,
                snapshot_size,
                current_size: Some(current.len() as u64),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => conflicts.push(Conflict {
                file: file.path.clone(),
                kind: ConflictKind::Added,
                snapshot_size,
                current_size: None,
            }),
            Err(e) => {
                log::warn!("Cannot compare {}: {e}", file.path);
                conflicts.push(Conflict {
                    file: file.path.clone(),
                    kind: ConflictKind::Modified,
                    snapshot_size,
                    current_size: None,
                });
            }
        }
    }

    conflicts
}

/// Files the resolver chose to take from the snapshot
#[must_use]
pub fn select_resolved<'a>(
    files: &'a [RestoreFile],
    resolutions: &[ConflictResolution],
) -> Vec<&'a RestoreFile> {
    let chosen: HashSet<&str> = resolutions
        .iter()
        .filter(|r| r.resolution == ResolutionChoice::UseSnapshot)
        .map(|r| r.file.as_str())
        .collect();

    files
        .iter()
        .filter(|f| chosen.contains(f.path.as_str()))
        .collect()
}

/// Write files back verbatim, creating parent directories as needed
pub fn write_restored_files(root: &Path, files: &[&RestoreFile]) -> Result<Vec<String>> {
    let mut written = Vec::with_capacity(files.len());

    for file in files {
        let relative = ensure_within_root(&file.path)?;
        let target = root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, file.content.as_bytes())?;
        log::trace!("Restored {}", file.path);
        written.push(file.path.clone());
    }

    Ok(written)
}
