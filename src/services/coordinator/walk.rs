//! Ignore-aware workspace walk.
//!
//! `WorkspaceWalker` is a lazy, finite, non-restartable iterator over regular files.
//! It never follows symbolic links. Hard limits are enforced by the consumer
//! (`collect_workspace_files`), which stops pulling as soon as one is exceeded.

use super::capture::CaptureLimits;
use crate::models::ErrorItem;
use crate::{Error, Result, WalkLimit};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::VecDeque;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const GITIGNORE_FILE: &str = ".gitignore";
/// Project-specific ignore file; its rules override `.gitignore`
pub const SNAPBACKIGNORE_FILE: &str = ".snapbackignore";

/// Always applied, lowest priority
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git/",
    ".hg/",
    ".svn/",
    ".snapback/",
    "node_modules/",
    "bower_components/",
    "target/",
    "dist/",
    "build/",
    "out/",
    ".next/",
    ".nuxt/",
    ".cache/",
    "coverage/",
    "__pycache__/",
    ".venv/",
    ".idea/",
    "*.log",
    "*.tmp",
    "*.swp",
    ".DS_Store",
    "Thumbs.db",
];

/// Normalize a path relative to the workspace root using `/` separators
#[must_use]
pub fn normalize_relative(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Compiled ignore rules for one workspace
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Defaults, then `.gitignore`, then `.snapbackignore`; later rules win
    pub fn load(root: &Path) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in DEFAULT_IGNORE_PATTERNS {
            builder
                .add_line(None, pattern)
                .map_err(|e| Error::InvalidInput(format!("ignore pattern {pattern}: {e}")))?;
        }

        for file_name in [GITIGNORE_FILE, SNAPBACKIGNORE_FILE] {
            let path = root.join(file_name);
            if path.is_file()
                && let Some(err) = builder.add(&path)
            {
                log::warn!("Some rules in {} were not loaded: {err}", path.display());
            }
        }

        let matcher = builder
            .build()
            .map_err(|e| Error::InvalidInput(format!("ignore rules: {e}")))?;
        log::debug!("Loaded {} ignore rules for {}", matcher.len(), root.display());
        Ok(Self { matcher })
    }

    /// Rules built from explicit patterns only
    pub fn from_patterns(root: &Path, patterns: &[&str]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| Error::InvalidInput(format!("ignore pattern {pattern}: {e}")))?;
        }
        let matcher = builder
            .build()
            .map_err(|e| Error::InvalidInput(format!("ignore rules: {e}")))?;
        Ok(Self { matcher })
    }

    /// `relative` is relative to the workspace root
    #[must_use]
    pub fn is_ignored(&self, relative: &Path, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

/// A regular file found by the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size_bytes: u64,
}

pub struct WorkspaceWalker {
    root: PathBuf,
    rules: IgnoreRules,
    stack: Vec<PathBuf>,
    ready: VecDeque<WalkEntry>,
    errors: Vec<ErrorItem>,
}

impl WorkspaceWalker {
    pub fn new(root: &Path) -> Result<Self> {
        let rules = IgnoreRules::load(root)?;
        Ok(Self::with_rules(root, rules))
    }

    #[must_use]
    pub fn with_rules(root: &Path, rules: IgnoreRules) -> Self {
        Self {
            root: root.to_path_buf(),
            rules,
            stack: vec![root.to_path_buf()],
            ready: VecDeque::new(),
            errors: Vec::new(),
        }
    }

    /// Per-entry errors seen so far; the walk continues past them
    #[must_use]
    pub fn errors(&self) -> &[ErrorItem] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ErrorItem> {
        std::mem::take(&mut self.errors)
    }

    fn record_error(&mut self, path: &Path, error: &std::io::Error) {
        log::warn!("Skipping {}: {error}", path.display());
        self.errors
            .push(ErrorItem::from_io(&path.to_string_lossy(), error));
    }

    /// Read one directory: files become ready, subdirectories are pushed so the
    /// first child (by name) is visited next
    fn expand(&mut self, dir: &Path) {
        let read = match fs::read_dir(dir) {
            Ok(r) => r,
            Err(e) => {
                self.record_error(dir, &e);
                return;
            }
        };

        let mut children = Vec::new();
        for entry in read {
            match entry {
                Ok(e) => children.push(e),
                Err(e) => self.record_error(dir, &e),
            }
        }
        children.sort_by_key(std::fs::DirEntry::file_name);

        let mut subdirs = Vec::new();
        for entry in children {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(e) => {
                    self.record_error(&path, &e);
                    continue;
                }
            };

            if file_type.is_symlink() {
                log::trace!("Skipping symlink {}", path.display());
                continue;
            }

            let relative = path.strip_prefix(&self.root).unwrap_or(&path);
            if self.rules.is_ignored(relative, file_type.is_dir()) {
                log::trace!("Ignored {}", relative.display());
                continue;
            }

            if file_type.is_dir() {
                subdirs.push(path);
            } else if file_type.is_file() {
                let metadata = match fs::symlink_metadata(&path) {
                    Ok(m) => m,
                    Err(e) => {
                        self.record_error(&path, &e);
                        continue;
                    }
                };
                self.ready.push_back(WalkEntry {
                    rel_path: normalize_relative(relative),
                    abs_path: path,
                    size_bytes: metadata.len(),
                });
            }
        }

        self.stack.extend(subdirs.into_iter().rev());
    }
}

impl Iterator for WorkspaceWalker {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        loop {
            if let Some(entry) = self.ready.pop_front() {
                return Some(entry);
            }
            let dir = self.stack.pop()?;
            self.expand(&dir);
        }
    }
}

/// Result of a complete, within-limits walk
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub entries: Vec<WalkEntry>,
    pub total_bytes: u64,
    pub errors: Vec<ErrorItem>,
}

/// Drain a walker, failing the whole walk once either hard limit is exceeded
pub fn collect_workspace_files(
    mut walker: WorkspaceWalker,
    limits: &CaptureLimits,
) -> Result<WalkOutcome> {
    let mut outcome = WalkOutcome::default();

    for entry in walker.by_ref() {
        outcome.total_bytes = outcome.total_bytes.saturating_add(entry.size_bytes);
        outcome.entries.push(entry);

        if outcome.entries.len() > limits.max_files {
            return Err(Error::LimitExceeded {
                limit: WalkLimit::FileCount,
                max: limits.max_files as u64,
            });
        }
        if outcome.total_bytes > limits.max_total_bytes {
            return Err(Error::LimitExceeded {
                limit: WalkLimit::TotalBytes,
                max: limits.max_total_bytes,
            });
        }
    }

    outcome.errors = walker.take_errors();
    log::debug!(
        "Walk found {} files ({} bytes, {} errors)",
        outcome.entries.len(),
        outcome.total_bytes,
        outcome.errors.len()
    );
    Ok(outcome)
}

/// Reject absolute paths and parent traversal in a workspace-relative path
pub fn ensure_within_root(relative: &str) -> Result<PathBuf> {
    let path = Path::new(relative);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.is_empty() || escapes {
        return Err(Error::InvalidInput(format!(
            "path escapes the workspace: {relative}"
        )));
    }
    Ok(path.to_path_buf())
}
