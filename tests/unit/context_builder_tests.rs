//! Unit tests for building save contexts from change events

use crate::fixtures::T0;
use snapback::models::{
    BurstSignal, CriticalFileSignal, DetectionEngineResult, RiskSignal, SessionSignal,
};
use snapback::services::context_builder::{
    ContextBuilder, file_context_from_event, file_extension, is_binary_path,
};
use snapback::{FileChangeEvent, FileChangeType, ValidationError};

fn detection() -> DetectionEngineResult {
    DetectionEngineResult {
        risk: RiskSignal { score: 45.0 },
        burst: BurstSignal {
            detected: true,
            file_count: 3,
        },
        critical: CriticalFileSignal {
            detected: true,
            count: 1,
            files: vec![".env".to_string()],
        },
        session: SessionSignal {
            session_id: "session-7".to_string(),
            file_count: 3,
            duration_ms: 4_000,
        },
        ..DetectionEngineResult::default()
    }
}

#[test]
fn extension_is_lowercased_suffix_of_file_name() {
    assert_eq!(file_extension("src/App.TSX"), "tsx");
    assert_eq!(file_extension(".env"), "env");
    assert_eq!(file_extension("archive.tar.gz"), "gz");
    assert_eq!(file_extension("Makefile"), "");
    assert_eq!(file_extension("dir.d/noext"), "");
}

#[test]
fn binary_detection_uses_extension() {
    assert!(is_binary_path("assets/logo.PNG"));
    assert!(is_binary_path("lib/native.so"));
    assert!(!is_binary_path("src/lib.rs"));
}

#[test]
fn file_context_reflects_change_type() {
    let created = file_context_from_event(
        &FileChangeEvent::new("src/new.ts", FileChangeType::Created).with_size(120),
    );
    assert!(created.is_new);
    assert_eq!(created.size_bytes, 120);
    assert_eq!(created.extension, "ts");
    assert_eq!(created.next_hash.len(), 16);
    assert!(created.prev_hash.is_none());

    let deleted = file_context_from_event(
        &FileChangeEvent::new("src/old.ts", FileChangeType::Deleted).with_size(99),
    );
    assert!(!deleted.is_new);
    assert_eq!(deleted.size_bytes, 0);
}

#[test]
fn later_event_for_same_path_wins() {
    let mut builder = ContextBuilder::new();
    builder
        .add_event(FileChangeEvent::new("a.ts", FileChangeType::Created).with_size(10))
        .add_event(FileChangeEvent::new("b.ts", FileChangeType::Modified).with_size(20))
        .add_event(FileChangeEvent::new("a.ts", FileChangeType::Modified).with_size(30));

    assert_eq!(builder.len(), 2);
    let files = builder.file_contexts();
    assert_eq!(files[0].path, "a.ts");
    assert_eq!(files[0].size_bytes, 30);
    assert!(!files[0].is_new);
    assert_eq!(files[1].path, "b.ts");
}

#[test]
fn live_paths_exclude_deleted_files() {
    let mut builder = ContextBuilder::new();
    builder.add_events([
        FileChangeEvent::new("keep.ts", FileChangeType::Modified),
        FileChangeEvent::new("gone.ts", FileChangeType::Created),
        FileChangeEvent::new("gone.ts", FileChangeType::Deleted),
    ]);

    assert_eq!(builder.live_paths(), vec!["keep.ts".to_string()]);
}

#[test]
fn build_copies_detector_output() {
    let mut builder = ContextBuilder::new();
    builder.add_events([
        FileChangeEvent::new(".env", FileChangeType::Modified).with_size(14),
        FileChangeEvent::new("src/a.ts", FileChangeType::Modified).with_size(40),
        FileChangeEvent::new("src/b.ts", FileChangeType::Created).with_size(8),
    ]);

    let ctx = builder.build("repo-9", &detection(), T0).unwrap();

    assert_eq!(ctx.repo_id, "repo-9");
    assert_eq!(ctx.timestamp, T0);
    assert_eq!(ctx.session_id, "session-7");
    assert_eq!(ctx.session_file_count, 3);
    assert_eq!(ctx.risk_score, 45.0);
    assert!(ctx.burst_detected);
    assert!(ctx.contains_critical_files);
    assert_eq!(ctx.critical_file_count, 1);
    assert_eq!(
        ctx.file_paths().collect::<Vec<_>>(),
        vec![".env", "src/a.ts", "src/b.ts"]
    );
}

#[test]
fn build_validates_the_context() {
    let builder = ContextBuilder::new();
    let mut det = detection();
    det.session.session_id.clear();

    let err = builder.build("repo-9", &det, T0).unwrap_err();
    assert!(matches!(
        err,
        snapback::Error::Validation(ValidationError::MissingSessionId)
    ));

    let err = builder.build("", &detection(), T0).unwrap_err();
    assert!(matches!(
        err,
        snapback::Error::Validation(ValidationError::MissingRepoId)
    ));
}

#[test]
fn clear_discards_pending_events() {
    let mut builder = ContextBuilder::new();
    builder.add_event(FileChangeEvent::new("x.ts", FileChangeType::Modified));
    builder.clear();
    assert!(builder.is_empty());
}
