//! Unit tests for the decision engine policy

use crate::fixtures::quiet_context;
use snapback::services::decision::validate_context;
use snapback::{DecisionConfig, DecisionEngine, DecisionReason, ValidationError};

fn engine() -> DecisionEngine {
    DecisionEngine::new(DecisionConfig::default())
}

#[test]
fn quiet_context_needs_no_protection() {
    let decision = engine().make_decision(&quiet_context());

    assert!(!decision.create_snapshot);
    assert!(!decision.show_notification);
    assert!(decision.reasons.is_empty());
    assert_eq!(decision.confidence, 0.0);
    assert_eq!(decision.summary, "No protection needed");
}

#[test]
fn risk_threshold_boundary_is_inclusive() {
    let mut ctx = quiet_context();
    ctx.risk_score = 60.0;
    let at = engine().make_decision(&ctx);
    assert!(at.create_snapshot);
    assert_eq!(at.reasons, vec![DecisionReason::RiskThreshold]);

    ctx.risk_score = 59.0;
    let below = engine().make_decision(&ctx);
    assert!(!below.create_snapshot);
    // 59 is still above the notify threshold
    assert!(below.show_notification);
}

#[test]
fn confidence_formula_matches_documented_example() {
    let mut ctx = quiet_context();
    ctx.ai_detected = true;
    ctx.ai_confidence = 0.8;
    ctx.risk_score = 60.0;

    let decision = engine().make_decision(&ctx);

    assert!(decision.create_snapshot);
    assert!((decision.confidence - 0.66).abs() < 1e-9);
    assert_eq!(
        decision.reasons,
        vec![DecisionReason::AiDetected, DecisionReason::RiskThreshold]
    );
}

#[test]
fn ai_below_snapshot_confidence_only_notifies() {
    let mut ctx = quiet_context();
    ctx.ai_detected = true;
    ctx.ai_confidence = 0.6;

    let decision = engine().make_decision(&ctx);

    assert!(!decision.create_snapshot);
    assert!(decision.show_notification);
}

#[test]
fn ai_at_half_confidence_does_not_notify() {
    let mut ctx = quiet_context();
    ctx.ai_detected = true;
    ctx.ai_confidence = 0.5;

    assert!(!engine().make_decision(&ctx).show_notification);
}

#[test]
fn burst_requires_minimum_session_files() {
    let mut ctx = quiet_context();
    ctx.burst_detected = true;
    ctx.session_file_count = 2;
    assert!(!engine().make_decision(&ctx).create_snapshot);

    ctx.session_file_count = 3;
    let decision = engine().make_decision(&ctx);
    assert!(decision.create_snapshot);
    assert_eq!(decision.reasons, vec![DecisionReason::BurstPattern]);
    assert_eq!(decision.summary, "burst of 3 files");
}

#[test]
fn critical_flag_without_count_does_not_trigger() {
    let mut ctx = quiet_context();
    ctx.contains_critical_files = true;
    ctx.critical_file_count = 0;

    assert!(!engine().make_decision(&ctx).create_snapshot);
}

#[test]
fn reasons_are_ordered_by_tier() {
    let mut ctx = quiet_context();
    ctx.burst_detected = true;
    ctx.session_file_count = 5;
    ctx.contains_critical_files = true;
    ctx.critical_file_count = 2;
    ctx.risk_score = 45.0;

    let decision = engine().make_decision(&ctx);

    assert_eq!(
        decision.reasons,
        vec![DecisionReason::CriticalFile, DecisionReason::BurstPattern]
    );
    assert!(decision.show_notification);
    assert_eq!(decision.summary, "2 critical files, burst of 5 files");
}

#[test]
fn summary_names_the_ai_tool() {
    let mut ctx = quiet_context();
    ctx.ai_detected = true;
    ctx.ai_confidence = 0.92;
    ctx.ai_tool_name = Some("Copilot".to_string());

    let decision = engine().make_decision(&ctx);

    assert_eq!(decision.summary, "Copilot detected (92% confidence)");
    assert_eq!(decision.context.ai_tool_name.as_deref(), Some("Copilot"));
}

#[test]
fn decisions_are_deterministic() {
    let mut ctx = quiet_context();
    ctx.risk_score = 72.5;
    ctx.burst_detected = true;
    ctx.session_file_count = 9;

    let engine = engine();
    assert_eq!(engine.make_decision(&ctx), engine.make_decision(&ctx));
}

#[test]
fn lowered_threshold_takes_effect_after_update() {
    let mut engine = engine();
    let mut ctx = quiet_context();
    ctx.risk_score = 30.0;
    assert!(!engine.make_decision(&ctx).create_snapshot);

    engine.update_config(DecisionConfig {
        risk_threshold: 25.0,
        notify_threshold: 10.0,
        ..DecisionConfig::default()
    });

    let decision = engine.make_decision(&ctx);
    assert!(decision.create_snapshot);
    assert!(decision.show_notification);
}

#[test]
fn inverted_thresholds_fall_back_to_defaults() {
    let engine = DecisionEngine::new(DecisionConfig {
        risk_threshold: 30.0,
        notify_threshold: 70.0,
        ..DecisionConfig::default()
    });

    assert_eq!(*engine.config(), DecisionConfig::default());
}

#[test]
fn out_of_range_config_is_clamped() {
    let config = DecisionConfig {
        risk_threshold: 250.0,
        notify_threshold: -5.0,
        min_files_for_burst: 0,
        max_snapshots_per_minute: 500,
    }
    .sanitized();

    assert_eq!(config.risk_threshold, 100.0);
    assert_eq!(config.notify_threshold, 0.0);
    assert_eq!(config.min_files_for_burst, 1);
    assert_eq!(config.max_snapshots_per_minute, 60);
}

#[test]
fn validation_rejects_out_of_range_fields() {
    let mut ctx = quiet_context();
    ctx.ai_confidence = 1.5;
    assert!(matches!(
        validate_context(&ctx),
        Err(snapback::Error::Validation(ValidationError::AiConfidenceOutOfRange(_)))
    ));

    let mut ctx = quiet_context();
    ctx.risk_score = 101.0;
    assert!(matches!(
        validate_context(&ctx),
        Err(snapback::Error::Validation(ValidationError::RiskScoreOutOfRange(_)))
    ));

    let mut ctx = quiet_context();
    ctx.session_id = "  ".to_string();
    assert!(matches!(
        validate_context(&ctx),
        Err(snapback::Error::Validation(ValidationError::MissingSessionId))
    ));

    let mut ctx = quiet_context();
    ctx.timestamp = 0;
    assert!(matches!(
        validate_context(&ctx),
        Err(snapback::Error::Validation(ValidationError::NonPositiveTimestamp(0)))
    ));

    assert!(validate_context(&quiet_context()).is_ok());
}
