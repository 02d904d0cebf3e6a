//! Per-subject cooldown between accepted attendance events.
//!
//! A subject is cooling down while less than the window has elapsed since
//! its last successful send; otherwise (or if never sent) it is idle. State is
//! evaluated lazily on each attempt and lives only in memory.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Minimum spacing between two recorded events for one subject.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CooldownGate {
    window: Duration,
    last_sent: HashMap<String, Instant>,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: HashMap::new(),
        }
    }

    /// Whether `subject_id` is still inside its window at `now`.
    pub fn is_cooling_down(&self, subject_id: &str, now: Instant) -> bool {
        self.last_sent
            .get(subject_id)
            .is_some_and(|&sent| now.saturating_duration_since(sent) < self.window)
    }

    /// Start a new window for `subject_id`. Call only after a successful send.
    pub fn record(&mut self, subject_id: &str, now: Instant) {
        self.last_sent.insert(subject_id.to_string(), now);
    }

    pub fn last_sent(&self, subject_id: &str) -> Option<Instant> {
        self.last_sent.get(subject_id).copied()
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
