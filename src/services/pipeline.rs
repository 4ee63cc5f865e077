//! End-to-end protection flow for one workspace.
//!
//! debounced events -> save context -> decision -> rate limit -> capture -> notify
//!
//! The pipeline owns the limiter, so the check-then-record sequence runs from a
//! single context.

use super::context_builder::ContextBuilder;
use super::coordinator::{OperationCoordinator, SnapshotRequest};
use super::debounce::ChangeDebouncer;
use super::decision::{DecisionConfig, DecisionEngine};
use super::notification::{NotificationAdapter, NotificationSink};
use super::rate_limiter::RateLimiter;
use crate::config::SnapbackConfig;
use crate::models::{DetectionEngineResult, FileChangeEvent, ProtectionDecision, UserNotification};
use crate::{Error, Result};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub decision: ProtectionDecision,
    /// Set when a snapshot was captured for this batch
    pub snapshot_id: Option<String>,
    /// The decision asked for a snapshot but the window was full
    pub rate_limited: bool,
    pub notification: Option<UserNotification>,
}

pub struct ProtectionPipeline<N: NotificationSink> {
    repo_id: String,
    engine: DecisionEngine,
    limiter: RateLimiter,
    coordinator: OperationCoordinator,
    adapter: NotificationAdapter,
    sink: N,
    debouncer: ChangeDebouncer,
    pre_save: HashMap<String, String>,
}

impl<N: NotificationSink> std::fmt::Debug for ProtectionPipeline<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionPipeline")
            .field("repo_id", &self.repo_id)
            .field("engine", &self.engine)
            .field("limiter", &self.limiter)
            .field("coordinator", &self.coordinator)
            .field("debouncer", &self.debouncer)
            .finish_non_exhaustive()
    }
}

impl<N: NotificationSink> ProtectionPipeline<N> {
    pub fn new(
        repo_id: impl Into<String>,
        coordinator: OperationCoordinator,
        config: &SnapbackConfig,
        sink: N,
    ) -> Result<Self> {
        let repo_id = repo_id.into();
        if repo_id.trim().is_empty() {
            return Err(Error::InvalidInput("repo id must not be empty".to_string()));
        }

        let mut adapter = NotificationAdapter::new(config.notification);
        adapter.init();

        Ok(Self {
            repo_id,
            engine: DecisionEngine::new(config.decision),
            limiter: RateLimiter::per_minute(config.decision.max_snapshots_per_minute)?,
            coordinator,
            adapter,
            sink,
            debouncer: ChangeDebouncer::new(config.debounce_ms),
            pre_save: HashMap::new(),
        })
    }

    #[must_use]
    pub fn coordinator(&self) -> &OperationCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut OperationCoordinator {
        &mut self.coordinator
    }

    #[must_use]
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Swap the decision policy; the snapshot rate follows `max_snapshots_per_minute`
    pub fn update_decision_config(&mut self, config: DecisionConfig) -> Result<()> {
        let config = config.sanitized();
        self.limiter.set_max_snapshots(config.max_snapshots_per_minute)?;
        self.engine.update_config(config);
        Ok(())
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn adapter_mut(&mut self) -> &mut NotificationAdapter {
        &mut self.adapter
    }

    #[must_use]
    pub fn sink(&self) -> &N {
        &self.sink
    }

    #[must_use]
    pub fn debouncer(&self) -> &ChangeDebouncer {
        &self.debouncer
    }

    pub fn record_event(&mut self, event: FileChangeEvent, now: i64) {
        self.debouncer.push(event, now);
    }

    /// Editor content of `path` just before it was saved. Held until the next
    /// processed batch, then dropped whether or not the path was in it.
    pub fn record_pre_save(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.pre_save.insert(path.into(), content.into());
    }

    #[must_use]
    pub fn pending_pre_save(&self) -> usize {
        self.pre_save.len()
    }

    /// Process the buffered batch if its quiet window has elapsed
    pub fn tick(
        &mut self,
        now: i64,
        detection: &DetectionEngineResult,
    ) -> Result<Option<PipelineOutcome>> {
        let Some(events) = self.debouncer.poll(now) else {
            return Ok(None);
        };

        let result = self.process(events, detection, now);
        self.debouncer.finish();
        result.map(Some)
    }

    /// Run one batch of events through the full flow, bypassing the debouncer
    pub fn process(
        &mut self,
        events: Vec<FileChangeEvent>,
        detection: &DetectionEngineResult,
        now: i64,
    ) -> Result<PipelineOutcome> {
        let mut pre_save = std::mem::take(&mut self.pre_save);
        let mut builder = ContextBuilder::new();
        builder.add_events(events);

        let context = builder.build(&self.repo_id, detection, now)?;
        let decision = self.engine.make_decision(&context);
        log::debug!(
            "Decision for {} files: snapshot={} notify={} reasons={:?}",
            builder.len(),
            decision.create_snapshot,
            decision.show_notification,
            decision.reasons
        );

        let mut snapshot_id = None;
        let mut rate_limited = false;

        if decision.create_snapshot {
            let paths = builder.capturable_paths();
            let status = self.limiter.get_status(now);
            if paths.is_empty() {
                log::debug!("Nothing in this batch can be captured");
            } else if !status.can_snapshot {
                log::info!(
                    "Snapshot rate limited; next slot in {} ms",
                    status.wait_time_ms
                );
                rate_limited = true;
            } else {
                pre_save.retain(|path, _| paths.contains(path));
                let request = SnapshotRequest::incremental(paths)
                    .with_decision(decision.clone())
                    .with_pre_save(pre_save);
                match self.coordinator.coordinate_snapshot_creation(request, now) {
                    Ok(id) => {
                        self.limiter.record_snapshot(now);
                        snapshot_id = Some(id);
                    }
                    Err(Error::EmptyCapture) => {
                        log::debug!("No readable files left to capture");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        // Notify about what actually happened, not what was asked for
        let mut shown = decision.clone();
        shown.create_snapshot = snapshot_id.is_some();
        let notification = self.adapter.adapt(&shown, now);
        if let Some(n) = &notification {
            self.sink.deliver(n)?;
        }

        Ok(PipelineOutcome {
            decision,
            snapshot_id,
            rate_limited,
            notification,
        })
    }

    /// Release notification state; the pipeline stays usable for decisions
    pub fn dispose(&mut self) {
        self.adapter.dispose();
    }
}
