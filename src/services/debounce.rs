//! Quiet-window coalescing of file change events.
//!
//! Events accumulate until no new event has arrived for `window_ms`. At most one
//! batch is in flight: while a batch is being processed, `poll` yields nothing and
//! newer events stay buffered for the next fire.

use crate::models::FileChangeEvent;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug)]
pub struct ChangeDebouncer {
    window_ms: u64,
    pending: Vec<FileChangeEvent>,
    last_event_at: Option<i64>,
    is_processing: bool,
}

impl Default for ChangeDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl ChangeDebouncer {
    #[must_use]
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            pending: Vec::new(),
            last_event_at: None,
            is_processing: false,
        }
    }

    #[must_use]
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    /// Buffer an event and restart the quiet window
    pub fn push(&mut self, event: FileChangeEvent, now: i64) {
        self.pending.push(event);
        self.last_event_at = Some(now);
    }

    /// Milliseconds until the buffered batch becomes due, if anything is buffered
    #[must_use]
    pub fn due_in(&self, now: i64) -> Option<u64> {
        let last = self.last_event_at?;
        if self.pending.is_empty() {
            return None;
        }
        let elapsed = u64::try_from(now.saturating_sub(last)).unwrap_or(0);
        Some(self.window_ms.saturating_sub(elapsed))
    }

    /// Take the buffered batch once the window has elapsed. The caller must call
    /// `finish` when done with it.
    pub fn poll(&mut self, now: i64) -> Option<Vec<FileChangeEvent>> {
        if self.is_processing {
            log::trace!("Debounce fired while processing; keeping {} events", self.pending.len());
            return None;
        }
        if self.due_in(now)? > 0 {
            return None;
        }

        self.is_processing = true;
        self.last_event_at = None;
        Some(std::mem::take(&mut self.pending))
    }

    pub fn finish(&mut self) {
        self.is_processing = false;
    }
}
