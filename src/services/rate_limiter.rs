//! Sliding-window admission control for snapshot creation.
//!
//! The check-then-record pair is only atomic for a single owner. Callers must
//! keep one limiter per coordinating context rather than sharing it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Window used when the limit is expressed per minute
pub const MINUTE_MS: u64 = 60_000;

/// Derived view of the window at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStatus {
    pub count: u32,
    pub remaining: u32,
    pub wait_time_ms: u64,
    pub can_snapshot: bool,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_snapshots: u32,
    window_ms: u64,
    timestamps: VecDeque<i64>,
}

impl RateLimiter {
    pub fn new(max_snapshots: u32, window_ms: u64) -> Result<Self> {
        if max_snapshots == 0 {
            return Err(Error::InvalidInput(
                "max_snapshots must be positive".to_string(),
            ));
        }
        if window_ms == 0 {
            return Err(Error::InvalidInput("window_ms must be positive".to_string()));
        }

        Ok(Self {
            max_snapshots,
            window_ms,
            timestamps: VecDeque::with_capacity(max_snapshots as usize),
        })
    }

    /// Limiter admitting at most `max_snapshots` per rolling minute
    pub fn per_minute(max_snapshots: u32) -> Result<Self> {
        Self::new(max_snapshots, MINUTE_MS)
    }

    /// Change the limit without forgetting snapshots already in the window
    pub fn set_max_snapshots(&mut self, max_snapshots: u32) -> Result<()> {
        if max_snapshots == 0 {
            return Err(Error::InvalidInput(
                "max_snapshots must be positive".to_string(),
            ));
        }
        self.max_snapshots = max_snapshots;
        Ok(())
    }

    /// Evict expired timestamps and report the window state at `now`
    pub fn get_status(&mut self, now: i64) -> RateLimiterStatus {
        let window = i64::try_from(self.window_ms).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(window);
        while self.timestamps.front().is_some_and(|&ts| ts < cutoff) {
            self.timestamps.pop_front();
        }

        let count = u32::try_from(self.timestamps.len()).unwrap_or(u32::MAX);
        let can_snapshot = count < self.max_snapshots;
        let wait_time_ms = if can_snapshot {
            0
        } else {
            self.timestamps.front().map_or(0, |&oldest| {
                let wait = oldest.saturating_add(window).saturating_sub(now);
                u64::try_from(wait.max(0)).unwrap_or(0)
            })
        };

        RateLimiterStatus {
            count,
            remaining: self.max_snapshots.saturating_sub(count),
            wait_time_ms,
            can_snapshot,
        }
    }

    /// Record an attempt at `now`; returns whether it was admitted
    pub fn record_snapshot(&mut self, now: i64) -> bool {
        let status = self.get_status(now);
        if !status.can_snapshot {
            log::debug!(
                "Snapshot rate limited: {} in window, retry in {}ms",
                status.count,
                status.wait_time_ms
            );
            return false;
        }

        self.timestamps.push_back(now);
        true
    }

    pub fn reset(&mut self) {
        self.timestamps.clear();
    }

    #[must_use]
    pub fn max_snapshots(&self) -> u32 {
        self.max_snapshots
    }

    #[must_use]
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}
