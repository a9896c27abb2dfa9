//! Exponential backoff between remediation attempts.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Restart backoff configuration, all values in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub base_secs: u64,
    pub max_secs: u64,
    /// A failure history older than this is discarded
    pub reset_window_secs: u64,
    /// Total restarts allowed per history, 0 for no limit
    #[serde(default)]
    pub max_restarts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_secs: 5,
            max_secs: 300,
            reset_window_secs: 3600,
            max_restarts: 0,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_secs: u64, max_secs: u64, reset_window_secs: u64) -> Self {
        Self {
            base_secs,
            max_secs,
            reset_window_secs,
            max_restarts: 0,
        }
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// `min(max, base * 2^count)`, saturating to `max` on overflow.
    pub fn wait_secs(&self, restart_count: u32) -> u64 {
        2u64.checked_pow(restart_count)
            .and_then(|factor| self.base_secs.checked_mul(factor))
            .map_or(self.max_secs, |wait| wait.min(self.max_secs))
    }

    /// Instant at which a restart becomes eligible when waiting from `now`.
    pub fn wait_until(&self, now: DateTime<Utc>, restart_count: u32) -> DateTime<Utc> {
        add_secs(now, self.wait_secs(restart_count))
    }

    /// Whether another backoff restart would exceed `max_restarts`. The
    /// first-seen restart is part of the history, so `restart_count + 1`
    /// restarts have already been issued.
    pub fn limit_reached(&self, restart_count: u32) -> bool {
        self.max_restarts > 0 && restart_count.saturating_add(1) >= self.max_restarts
    }

    /// Whether a history whose last restart was at `restart_time` has aged
    /// out of the reset window.
    pub fn is_stale(&self, restart_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(restart_time) >= secs(self.reset_window_secs)
    }
}

pub(crate) fn secs(seconds: u64) -> TimeDelta {
    i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

pub(crate) fn add_secs(time: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    time.checked_add_signed(secs(seconds))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
