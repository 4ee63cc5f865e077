//! Deterministic protection policy.
//!
//! `DecisionEngine::make_decision` is a pure function of the save context and the
//! current configuration. It performs no I/O and reads no clock.

use crate::models::{DecisionContextSummary, DecisionReason, ProtectionDecision, SaveContext};
use crate::{Result, ValidationError};
use serde::{Deserialize, Serialize};

/// AI confidence at or above which a snapshot is always taken
const AI_SNAPSHOT_CONFIDENCE: f64 = 0.8;
/// AI confidence above which the user is notified
const AI_NOTIFY_CONFIDENCE: f64 = 0.5;
const SIGNAL_SLOTS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub risk_threshold: f64,
    pub notify_threshold: f64,
    pub min_files_for_burst: u32,
    pub max_snapshots_per_minute: u32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            risk_threshold: 60.0,
            notify_threshold: 40.0,
            min_files_for_burst: 3,
            max_snapshots_per_minute: 4,
        }
    }
}

impl DecisionConfig {
    /// Clamp every value into its documented range. An inverted policy
    /// (notify above risk) falls back to defaults.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let clamp_score = |v: f64, fallback: f64| {
            if v.is_finite() {
                v.clamp(0.0, 100.0)
            } else {
                fallback
            }
        };
        let defaults = Self::default();

        let clamped = Self {
            risk_threshold: clamp_score(self.risk_threshold, defaults.risk_threshold),
            notify_threshold: clamp_score(self.notify_threshold, defaults.notify_threshold),
            min_files_for_burst: self.min_files_for_burst.clamp(1, 1000),
            max_snapshots_per_minute: self.max_snapshots_per_minute.clamp(1, 60),
        };

        if clamped.notify_threshold > clamped.risk_threshold {
            log::warn!(
                "notify threshold {} exceeds risk threshold {}; using defaults",
                clamped.notify_threshold,
                clamped.risk_threshold
            );
            return defaults;
        }

        clamped
    }
}

/// Check a context against the documented bounds. `make_decision` does not call this.
pub fn validate_context(context: &SaveContext) -> Result<()> {
    if context.repo_id.trim().is_empty() {
        return Err(ValidationError::MissingRepoId.into());
    }
    if context.session_id.trim().is_empty() {
        return Err(ValidationError::MissingSessionId.into());
    }
    if context.timestamp <= 0 {
        return Err(ValidationError::NonPositiveTimestamp(context.timestamp).into());
    }
    if !(0.0..=1.0).contains(&context.ai_confidence) {
        return Err(ValidationError::AiConfidenceOutOfRange(context.ai_confidence).into());
    }
    if !(0.0..=100.0).contains(&context.risk_score) {
        return Err(ValidationError::RiskScoreOutOfRange(context.risk_score).into());
    }
    if context.files.iter().any(|f| f.path.is_empty()) {
        return Err(ValidationError::EmptyFilePath.into());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Triggers {
    ai: bool,
    risk: bool,
    critical: bool,
    burst: bool,
}

impl Triggers {
    fn any(self) -> bool {
        self.ai || self.risk || self.critical || self.burst
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    config: DecisionConfig,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: DecisionConfig) {
        self.config = config.sanitized();
    }

    #[must_use]
    pub fn make_decision(&self, context: &SaveContext) -> ProtectionDecision {
        let triggers = self.triggers(context);
        let create_snapshot = triggers.any();
        let show_notification = context.risk_score >= self.config.notify_threshold
            || (context.ai_detected && context.ai_confidence > AI_NOTIFY_CONFIDENCE);

        let reasons = if create_snapshot {
            attribute_reasons(triggers)
        } else {
            Vec::new()
        };

        let confidence = if create_snapshot {
            self.confidence(context)
        } else {
            0.0
        };

        let summary = summarize(context, &reasons);

        let decision = ProtectionDecision {
            create_snapshot,
            show_notification,
            reasons,
            confidence,
            summary,
            context: DecisionContextSummary {
                risk_score: context.risk_score,
                session_id: context.session_id.clone(),
                files_in_session: context.session_file_count,
                critical_file_count: context.critical_file_count,
                ai_tool_name: context.ai_tool_name.clone(),
            },
        };

        log::debug!(
            "Decision for {}: snapshot={} notify={} reasons={:?} confidence={}",
            context.session_id,
            decision.create_snapshot,
            decision.show_notification,
            decision.reasons,
            decision.confidence
        );

        decision
    }

    fn triggers(&self, context: &SaveContext) -> Triggers {
        Triggers {
            ai: context.ai_detected && context.ai_confidence >= AI_SNAPSHOT_CONFIDENCE,
            risk: context.risk_score >= self.config.risk_threshold,
            critical: context.contains_critical_files && context.critical_file_count > 0,
            burst: context.burst_detected
                && context.session_file_count >= self.config.min_files_for_burst,
        }
    }

    fn confidence(&self, context: &SaveContext) -> f64 {
        let ai_component = if context.ai_detected {
            context.ai_confidence
        } else {
            0.0
        };
        let risk_component = (context.risk_score / 100.0).min(1.0);

        let signals = [
            context.ai_detected,
            context.risk_score >= self.config.notify_threshold,
            context.burst_detected,
            context.contains_critical_files,
        ];
        #[allow(clippy::cast_precision_loss)]
        let signal_count = signals.iter().filter(|&&s| s).count() as f64;
        let signal_component = (signal_count / SIGNAL_SLOTS).min(1.0);

        let raw = 0.4 * ai_component + 0.4 * risk_component + 0.2 * signal_component;
        ((raw * 100.0).round() / 100.0).min(1.0)
    }
}

fn attribute_reasons(triggers: Triggers) -> Vec<DecisionReason> {
    let mut reasons = Vec::with_capacity(4);
    if triggers.ai {
        reasons.push(DecisionReason::AiDetected);
    }
    if triggers.risk {
        reasons.push(DecisionReason::RiskThreshold);
    }
    if triggers.critical {
        reasons.push(DecisionReason::CriticalFile);
    }
    if triggers.burst {
        reasons.push(DecisionReason::BurstPattern);
    }
    if reasons.is_empty() {
        reasons.push(DecisionReason::Fallback);
    }
    reasons.sort_by_key(|r| r.tier());
    reasons
}

fn summarize(context: &SaveContext, reasons: &[DecisionReason]) -> String {
    if reasons.is_empty() {
        return "No protection needed".to_string();
    }

    reasons
        .iter()
        .map(|reason| match reason {
            DecisionReason::AiDetected => {
                let pct = (context.ai_confidence * 100.0).round();
                match context.ai_tool_name.as_deref() {
                    Some(tool) => format!("{tool} detected ({pct}% confidence)"),
                    None => format!("AI detected ({pct}% confidence)"),
                }
            }
            DecisionReason::RiskThreshold => format!("risk score {}", context.risk_score),
            DecisionReason::CriticalFile => {
                let n = context.critical_file_count;
                if n == 1 {
                    "1 critical file".to_string()
                } else {
                    format!("{n} critical files")
                }
            }
            DecisionReason::BurstPattern => {
                format!("burst of {} files", context.session_file_count)
            }
            DecisionReason::Fallback => "protection triggered".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
