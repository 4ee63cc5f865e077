//! Latest-value signal slots stamped into a save context on demand

use crate::models::{
    AiSignal, BurstSignal, CriticalFileSignal, FileContext, RiskSignal, SaveContext, SessionSignal,
};
use crate::services::decision::validate_context;
use crate::Result;

/// Thresholds for the auxiliary high-risk query; these do not drive decisions
const HIGH_RISK_AI_CONFIDENCE: f64 = 0.7;
const HIGH_RISK_SCORE: f64 = 60.0;
const HIGH_RISK_BURST_FILES: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct SignalAggregator {
    ai: AiSignal,
    risk: RiskSignal,
    burst: BurstSignal,
    critical: CriticalFileSignal,
    session: SessionSignal,
}

impl SignalAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ai_signal(&mut self, signal: AiSignal) {
        self.ai = signal;
    }

    pub fn set_risk_signal(&mut self, signal: RiskSignal) {
        self.risk = signal;
    }

    pub fn set_burst_signal(&mut self, signal: BurstSignal) {
        self.burst = signal;
    }

    pub fn set_critical_signal(&mut self, signal: CriticalFileSignal) {
        self.critical = signal;
    }

    pub fn set_session_signal(&mut self, signal: SessionSignal) {
        self.session = signal;
    }

    /// Stamp the current slots into a validated context
    pub fn aggregate(&self, files: Vec<FileContext>, repo_id: &str, now: i64) -> Result<SaveContext> {
        let context = SaveContext {
            repo_id: repo_id.to_string(),
            timestamp: now,
            files,
            ai_detected: self.ai.detected,
            ai_tool_name: self.ai.tool_name.clone(),
            ai_confidence: self.ai.confidence,
            session_id: self.session.session_id.clone(),
            session_file_count: self.session.file_count,
            session_duration_ms: self.session.duration_ms,
            risk_score: self.risk.score,
            burst_detected: self.burst.detected,
            contains_critical_files: self.critical.detected,
            critical_file_count: self.critical.count,
        };
        validate_context(&context)?;
        Ok(context)
    }

    #[must_use]
    pub fn is_high_risk(&self) -> bool {
        (self.ai.detected && self.ai.confidence >= HIGH_RISK_AI_CONFIDENCE)
            || self.risk.score >= HIGH_RISK_SCORE
            || (self.burst.detected
                && self.burst.file_count >= HIGH_RISK_BURST_FILES
                && self.critical.count > 0)
    }

    /// Number of independently triggered heuristics, 0 to 5
    #[must_use]
    pub fn get_signal_strength(&self) -> u8 {
        let signals = [
            self.ai.detected,
            self.risk.score >= HIGH_RISK_SCORE,
            self.burst.detected,
            self.critical.detected && self.critical.count > 0,
            self.session.file_count >= HIGH_RISK_BURST_FILES,
        ];
        signals.iter().map(|&s| u8::from(s)).sum()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
