//! Protection decision produced once per save context

use serde::{Deserialize, Serialize};

/// Why a snapshot was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    AiDetected,
    RiskThreshold,
    CriticalFile,
    BurstPattern,
    Fallback,
}

impl DecisionReason {
    /// Priority tier; lower tiers always sort first in a decision
    #[must_use]
    pub fn tier(self) -> u8 {
        match self {
            DecisionReason::AiDetected
            | DecisionReason::RiskThreshold
            | DecisionReason::CriticalFile => 1,
            DecisionReason::BurstPattern => 2,
            DecisionReason::Fallback => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionReason::AiDetected => "ai_detected",
            DecisionReason::RiskThreshold => "risk_threshold",
            DecisionReason::CriticalFile => "critical_file",
            DecisionReason::BurstPattern => "burst_pattern",
            DecisionReason::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slice of the save context carried along with a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionContextSummary {
    pub risk_score: f64,
    pub session_id: String,
    pub files_in_session: u32,
    pub critical_file_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_tool_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionDecision {
    pub create_snapshot: bool,
    pub show_notification: bool,
    /// Empty only when `create_snapshot` is false
    pub reasons: Vec<DecisionReason>,
    pub confidence: f64,
    pub summary: String,
    pub context: DecisionContextSummary,
}

impl ProtectionDecision {
    #[must_use]
    pub fn has_reason(&self, reason: DecisionReason) -> bool {
        self.reasons.contains(&reason)
    }
}
