//! Ignore-aware walk and hard limits

use crate::fixtures::write_rel;
use snapback::services::coordinator::capture::CaptureLimits;
use snapback::services::coordinator::walk::{
    IgnoreRules, WorkspaceWalker, collect_workspace_files, ensure_within_root,
};
use snapback::WalkLimit;
use std::path::Path;
use tempfile::TempDir;

fn walked_paths(root: &Path) -> Vec<String> {
    let mut paths: Vec<String> = WorkspaceWalker::new(root)
        .unwrap()
        .map(|e| e.rel_path)
        .collect();
    paths.sort();
    paths
}

#[test]
fn default_rules_skip_tooling_directories() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_rel(root, "src/app.ts", "a");
    write_rel(root, "node_modules/dep/index.js", "b");
    write_rel(root, ".git/HEAD", "c");
    write_rel(root, ".snapback/state.json", "{}");
    write_rel(root, "debug.log", "d");

    assert_eq!(walked_paths(root), vec!["src/app.ts".to_string()]);
}

#[test]
fn snapbackignore_overrides_gitignore() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_rel(root, ".gitignore", "generated/\n");
    write_rel(root, ".snapbackignore", "!generated/\nnotes.md\n");
    write_rel(root, "generated/schema.ts", "s");
    write_rel(root, "notes.md", "n");
    write_rel(root, "main.ts", "m");

    let paths = walked_paths(root);
    assert!(paths.contains(&"generated/schema.ts".to_string()));
    assert!(paths.contains(&"main.ts".to_string()));
    assert!(!paths.contains(&"notes.md".to_string()));
}

#[test]
fn explicit_patterns_match_relative_paths() {
    let temp = TempDir::new().unwrap();
    let rules = IgnoreRules::from_patterns(temp.path(), &["*.bak", "tmp/"]).unwrap();

    assert!(rules.is_ignored(Path::new("a/b.bak"), false));
    assert!(rules.is_ignored(Path::new("tmp/x.ts"), false));
    assert!(!rules.is_ignored(Path::new("src/x.ts"), false));
}

#[test]
fn walk_fails_once_file_count_exceeded() {
    let temp = TempDir::new().unwrap();
    for i in 0..6 {
        write_rel(temp.path(), &format!("f{i}.ts"), "x");
    }
    let limits = CaptureLimits {
        max_files: 5,
        ..CaptureLimits::default()
    };

    let err = collect_workspace_files(WorkspaceWalker::new(temp.path()).unwrap(), &limits)
        .unwrap_err();
    assert!(matches!(
        err,
        snapback::Error::LimitExceeded {
            limit: WalkLimit::FileCount,
            max: 5
        }
    ));
}

#[test]
fn walk_fails_once_total_size_exceeded() {
    let temp = TempDir::new().unwrap();
    write_rel(temp.path(), "a.ts", &"a".repeat(60));
    write_rel(temp.path(), "b.ts", &"b".repeat(60));
    let limits = CaptureLimits {
        max_total_bytes: 100,
        ..CaptureLimits::default()
    };

    let err = collect_workspace_files(WorkspaceWalker::new(temp.path()).unwrap(), &limits)
        .unwrap_err();
    assert!(matches!(
        err,
        snapback::Error::LimitExceeded {
            limit: WalkLimit::TotalBytes,
            ..
        }
    ));
}

#[test]
fn walk_within_limits_reports_totals() {
    let temp = TempDir::new().unwrap();
    write_rel(temp.path(), "a.ts", "12345");
    write_rel(temp.path(), "nested/deep/b.ts", "123");

    let outcome =
        collect_workspace_files(WorkspaceWalker::new(temp.path()).unwrap(), &CaptureLimits::default())
            .unwrap();
    assert_eq!(outcome.entries.len(), 2);
    assert_eq!(outcome.total_bytes, 8);
    assert!(outcome.errors.is_empty());
}

#[cfg(unix)]
#[test]
fn symlinks_are_not_followed() {
    let temp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    write_rel(outside.path(), "secret.ts", "s");
    write_rel(temp.path(), "real.ts", "r");
    std::os::unix::fs::symlink(outside.path(), temp.path().join("linked")).unwrap();

    assert_eq!(walked_paths(temp.path()), vec!["real.ts".to_string()]);
}

#[test]
fn relative_paths_cannot_escape_root() {
    assert!(ensure_within_root("src/a.ts").is_ok());
    assert!(ensure_within_root("../etc/passwd").is_err());
    assert!(ensure_within_root("/etc/passwd").is_err());
    assert!(ensure_within_root("").is_err());
}
