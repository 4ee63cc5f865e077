//! Map protection decisions to user notifications.
//!
//! A snapshot taken without `show_notification` is silent: no notification is
//! produced. The adapter owns its duplicate tracker; there is no shared state.

use crate::models::{
    DecisionReason, NotificationAction, NotificationState, NotificationType, ProtectionDecision,
    Severity, UserNotification,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CRITICAL_CONFIDENCE: f64 = 0.8;
const CRITICAL_RISK_WITH_CRITICAL_FILE: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Same notification type for the same session is suppressed within this window
    pub cooldown_ms: u64,
    pub snapshot_auto_dismiss_ms: u64,
    pub risk_auto_dismiss_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 30_000,
            snapshot_auto_dismiss_ms: 8_000,
            risk_auto_dismiss_ms: 5_000,
        }
    }
}

/// Display boundary; rendering is the sink's business
pub trait NotificationSink {
    fn deliver(&mut self, notification: &UserNotification) -> Result<()>;
}

/// Sink retaining everything delivered to it
#[derive(Debug, Default)]
pub struct MemoryNotificationSink {
    delivered: Vec<UserNotification>,
}

impl MemoryNotificationSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn delivered(&self) -> &[UserNotification] {
        &self.delivered
    }
}

impl NotificationSink for MemoryNotificationSink {
    fn deliver(&mut self, notification: &UserNotification) -> Result<()> {
        self.delivered.push(notification.clone());
        Ok(())
    }
}

/// Sink that writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn deliver(&mut self, n: &UserNotification) -> Result<()> {
        match n.severity {
            Severity::Critical | Severity::Warning => log::warn!("{}: {}", n.title, n.message),
            Severity::Info => log::info!("{}: {}", n.title, n.message),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NotificationAdapter {
    config: NotificationConfig,
    active: bool,
    last_shown: HashMap<(String, NotificationType), i64>,
    notifications: HashMap<String, UserNotification>,
}

impl NotificationAdapter {
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            config,
            active: false,
            last_shown: HashMap::new(),
            notifications: HashMap::new(),
        }
    }

    pub fn init(&mut self) {
        self.active = true;
    }

    pub fn update_config(&mut self, config: NotificationConfig) {
        self.config = config;
    }

    /// Drop all tracked state; `adapt` yields nothing until `init` is called again
    pub fn dispose(&mut self) {
        self.active = false;
        self.last_shown.clear();
        self.notifications.clear();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Build a notification for `decision`, or `None` when nothing should be shown
    pub fn adapt(&mut self, decision: &ProtectionDecision, now: i64) -> Option<UserNotification> {
        if !self.active || !decision.show_notification {
            return None;
        }
        if decision.create_snapshot && decision.reasons.is_empty() {
            return None;
        }

        let kind = if decision.create_snapshot {
            NotificationType::SnapshotCreated
        } else {
            NotificationType::RiskDetected
        };

        let key = (decision.context.session_id.clone(), kind);
        if let Some(&shown_at) = self.last_shown.get(&key) {
            let elapsed = now.saturating_sub(shown_at);
            if elapsed >= 0 && (elapsed as u64) < self.config.cooldown_ms {
                log::debug!(
                    "Suppressing duplicate {kind:?} notification for {}",
                    decision.context.session_id
                );
                return None;
            }
        }

        let notification = match kind {
            NotificationType::SnapshotCreated => self.snapshot_notification(decision),
            NotificationType::RiskDetected => self.risk_notification(decision),
        };

        self.last_shown.insert(key, now);
        self.notifications
            .insert(notification.id.clone(), notification.clone());
        Some(notification)
    }

    fn snapshot_notification(&self, decision: &ProtectionDecision) -> UserNotification {
        let critical = decision.confidence >= CRITICAL_CONFIDENCE
            || (decision.has_reason(DecisionReason::CriticalFile)
                && decision.context.risk_score >= CRITICAL_RISK_WITH_CRITICAL_FILE);
        let severity = if critical {
            Severity::Critical
        } else {
            Severity::Warning
        };

        let title = if decision.has_reason(DecisionReason::AiDetected) {
            "AI edits protected"
        } else if decision.has_reason(DecisionReason::CriticalFile) {
            "Critical file change protected"
        } else {
            "Snapshot created"
        };

        UserNotification {
            id: uuid::Uuid::new_v4().to_string(),
            kind: NotificationType::SnapshotCreated,
            severity,
            title: title.to_string(),
            message: format!("Snapshot saved: {}", decision.summary),
            actions: vec![
                NotificationAction::new("view_snapshot", "View snapshot"),
                NotificationAction::new("restore", "Restore"),
                NotificationAction::new("dismiss", "Dismiss"),
            ],
            state: NotificationState::Pending,
            auto_dismiss_ms: (!critical).then_some(self.config.snapshot_auto_dismiss_ms),
            persistent: critical,
        }
    }

    fn risk_notification(&self, decision: &ProtectionDecision) -> UserNotification {
        let message = match decision.context.ai_tool_name.as_deref() {
            Some(tool) => format!(
                "{tool} activity with risk score {}; no snapshot was taken",
                decision.context.risk_score
            ),
            None => format!(
                "Risk score {}; no snapshot was taken",
                decision.context.risk_score
            ),
        };

        UserNotification {
            id: uuid::Uuid::new_v4().to_string(),
            kind: NotificationType::RiskDetected,
            severity: Severity::Info,
            title: "Risky changes detected".to_string(),
            message,
            actions: vec![
                NotificationAction::new("create_snapshot", "Snapshot now"),
                NotificationAction::new("dismiss", "Dismiss"),
            ],
            state: NotificationState::Pending,
            auto_dismiss_ms: Some(self.config.risk_auto_dismiss_ms),
            persistent: false,
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&UserNotification> {
        self.notifications.get(id)
    }

    pub fn mark_shown(&mut self, id: &str) -> Result<()> {
        self.transition(id, NotificationState::Shown)
    }

    pub fn mark_acted(&mut self, id: &str) -> Result<()> {
        self.transition(id, NotificationState::Acted)
    }

    pub fn dismiss(&mut self, id: &str) -> Result<()> {
        self.transition(id, NotificationState::Dismissed)
    }

    fn transition(&mut self, id: &str, next: NotificationState) -> Result<()> {
        let notification = self
            .notifications
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("notification {id}")))?;

        let allowed = matches!(
            (notification.state, next),
            (NotificationState::Pending, _)
                | (
                    NotificationState::Shown,
                    NotificationState::Acted | NotificationState::Dismissed
                )
        );
        if !allowed {
            return Err(Error::InvalidInput(format!(
                "notification {id} cannot move from {:?} to {next:?}",
                notification.state
            )));
        }

        notification.state = next;
        if matches!(next, NotificationState::Acted | NotificationState::Dismissed) {
            self.notifications.remove(id);
        }
        Ok(())
    }
}
