use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ContainerId = String;

/// Remediation bookkeeping for one container ever observed unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartRecord {
    pub id: ContainerId,
    pub name: String,
    /// Consecutive backoff-driven restarts since the last reset
    pub restart_count: u32,
    /// When the most recent restart was issued
    pub restart_time: DateTime<Utc>,
    /// A restart command is in flight
    pub restarting: bool,
    /// Earliest instant of the next backoff-gated restart; `None` when no wait is pending
    pub wait_time: Option<DateTime<Utc>>,
    /// Last time the container appeared in an unhealthy snapshot
    pub last_seen: DateTime<Utc>,
}

impl RestartRecord {
    pub fn new(id: impl Into<ContainerId>, restart_count: u32, time: DateTime<Utc>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            restart_count,
            restart_time: time,
            restarting: false,
            wait_time: None,
            last_seen: time,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Counters a rollback restores after a failed restart.
    pub(crate) fn checkpoint(&self) -> RecordCheckpoint {
        RecordCheckpoint {
            restart_count: self.restart_count,
            restart_time: self.restart_time,
            wait_time: self.wait_time,
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: &RecordCheckpoint) {
        self.restart_count = checkpoint.restart_count;
        self.restart_time = checkpoint.restart_time;
        self.wait_time = checkpoint.wait_time;
    }
}

/// Snapshot of a record's counters taken before a restart decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCheckpoint {
    restart_count: u32,
    restart_time: DateTime<Utc>,
    wait_time: Option<DateTime<Utc>>,
}

/// Why a restart was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartReason {
    /// Container had no record yet
    FirstSeen,
    /// Failure history was older than the reset window
    WindowReset,
    /// The pending backoff wait has elapsed
    BackoffElapsed,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::FirstSeen => write!(f, "first seen unhealthy"),
            RestartReason::WindowReset => write!(f, "reset window elapsed"),
            RestartReason::BackoffElapsed => write!(f, "backoff elapsed"),
        }
    }
}

/// Outcome of evaluating one container against its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Issue a restart now. The record has already been advanced and marked
    /// in flight; `rollback` holds its previous counters.
    Restart {
        reason: RestartReason,
        restart_count: u32,
        rollback: RecordCheckpoint,
    },
    /// A restart is already in flight
    Skip,
    /// A new backoff wait was scheduled
    ScheduleWait {
        wait_secs: u64,
        until: DateTime<Utc>,
    },
    /// Still waiting for a previously scheduled backoff
    Waiting { until: DateTime<Utc> },
    /// Backoff elapsed but the history already used up its restarts. Stays
    /// this way until the reset window or a daily clear drops the history.
    LimitReached { restart_count: u32, limit: u32 },
}

/// What happens to a record's counters when its restart call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartFailurePolicy {
    /// Keep the advanced counters, as if the restart had succeeded. A broken
    /// restart path then backs off like any other failure.
    #[default]
    Advance,
    /// Restore the counters the record had before the failed attempt.
    Rollback,
}

impl fmt::Display for RestartFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartFailurePolicy::Advance => write!(f, "advance"),
            RestartFailurePolicy::Rollback => write!(f, "rollback"),
        }
    }
}

impl FromStr for RestartFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "advance" => Ok(RestartFailurePolicy::Advance),
            "rollback" => Ok(RestartFailurePolicy::Rollback),
            other => Err(format!(
                "unknown restart failure policy '{other}' (expected 'advance' or 'rollback')"
            )),
        }
    }
}

/// Summary of one decision pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub observed: usize,
    pub restarted: usize,
    pub failed: usize,
    pub scheduled: usize,
    pub waiting: usize,
    pub skipped: usize,
    pub limited: usize,
    /// The runtime listing failed; nothing was remediated
    pub list_failed: bool,
}

impl PassReport {
    pub(crate) fn record(&mut self, decision: &Decision) {
        match decision {
            Decision::Restart { .. } => {}
            Decision::Skip => self.skipped += 1,
            Decision::ScheduleWait { .. } => self.scheduled += 1,
            Decision::Waiting { .. } => self.waiting += 1,
            Decision::LimitReached { .. } => self.limited += 1,
        }
    }
}
