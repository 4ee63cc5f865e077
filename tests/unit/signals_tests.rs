//! Unit tests for signal aggregation

use crate::fixtures::T0;
use snapback::models::{AiSignal, BurstSignal, CriticalFileSignal, RiskSignal, SessionSignal};
use snapback::services::signals::SignalAggregator;

fn with_session() -> SignalAggregator {
    let mut agg = SignalAggregator::new();
    agg.set_session_signal(SessionSignal {
        session_id: "s-1".to_string(),
        file_count: 1,
        duration_ms: 10,
    });
    agg
}

#[test]
fn empty_aggregator_is_not_high_risk() {
    let agg = with_session();
    assert!(!agg.is_high_risk());
    assert_eq!(agg.get_signal_strength(), 0);
}

#[test]
fn ai_confidence_threshold_marks_high_risk() {
    let mut agg = with_session();
    agg.set_ai_signal(AiSignal {
        detected: true,
        tool_name: Some("Cursor".to_string()),
        confidence: 0.7,
    });
    assert!(agg.is_high_risk());
    assert_eq!(agg.get_signal_strength(), 1);
}

#[test]
fn burst_alone_is_not_high_risk_without_critical_files() {
    let mut agg = with_session();
    agg.set_burst_signal(BurstSignal {
        detected: true,
        file_count: 6,
    });
    assert!(!agg.is_high_risk());

    agg.set_critical_signal(CriticalFileSignal {
        detected: true,
        count: 1,
        files: vec!["package.json".to_string()],
    });
    assert!(agg.is_high_risk());
}

#[test]
fn signal_strength_counts_every_heuristic() {
    let mut agg = SignalAggregator::new();
    agg.set_ai_signal(AiSignal {
        detected: true,
        tool_name: None,
        confidence: 0.3,
    });
    agg.set_risk_signal(RiskSignal { score: 75.0 });
    agg.set_burst_signal(BurstSignal {
        detected: true,
        file_count: 4,
    });
    agg.set_critical_signal(CriticalFileSignal {
        detected: true,
        count: 2,
        files: Vec::new(),
    });
    agg.set_session_signal(SessionSignal {
        session_id: "s-2".to_string(),
        file_count: 4,
        duration_ms: 100,
    });

    assert_eq!(agg.get_signal_strength(), 5);
}

#[test]
fn aggregate_stamps_slots_into_context() {
    let mut agg = with_session();
    agg.set_risk_signal(RiskSignal { score: 61.0 });

    let ctx = agg.aggregate(Vec::new(), "repo-a", T0).unwrap();
    assert_eq!(ctx.risk_score, 61.0);
    assert_eq!(ctx.session_id, "s-1");
    assert_eq!(ctx.repo_id, "repo-a");
}

#[test]
fn aggregate_rejects_missing_session() {
    let agg = SignalAggregator::new();
    assert!(agg.aggregate(Vec::new(), "repo-a", T0).is_err());
}

#[test]
fn reset_clears_all_slots() {
    let mut agg = with_session();
    agg.set_risk_signal(RiskSignal { score: 90.0 });
    agg.reset();
    assert!(!agg.is_high_risk());
    assert!(agg.aggregate(Vec::new(), "repo-a", T0).is_err());
}
