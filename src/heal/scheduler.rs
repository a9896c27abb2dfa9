//! Periodic pass scheduling.

use crate::heal::engine::Remediator;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info};

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Fires a decision pass every `interval` until shut down.
///
/// Each pass runs as its own task, so a pass that outlives the interval does
/// not delay the next tick; overlapping passes share the same store.
#[derive(Debug)]
pub struct Scheduler {
    remediator: Remediator,
    interval: Duration,
    record_ttl_secs: u64,
    daily_clear: bool,
}

impl Scheduler {
    pub fn new(remediator: Remediator, interval: Duration) -> Self {
        Self {
            remediator,
            interval,
            record_ttl_secs: 0,
            daily_clear: false,
        }
    }

    /// Evict records unseen for `ttl_secs` after every pass. 0 disables eviction.
    pub fn with_record_ttl(mut self, ttl_secs: u64) -> Self {
        self.record_ttl_secs = ttl_secs;
        self
    }

    /// Drop all settled records at every local midnight.
    pub fn with_daily_clear(mut self, enabled: bool) -> Self {
        self.daily_clear = enabled;
        self
    }

    /// Run on a background task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Tick until `shutdown` flips to `true` or its sender is dropped, then
    /// wait for in-flight passes to finish.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut passes = JoinSet::new();
        let mut pass_id: u64 = 0;

        info!(
            "Scheduler started with interval: {}s",
            self.interval.as_secs_f64()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    pass_id += 1;
                    let remediator = self.remediator.clone();
                    let ttl = self.record_ttl_secs;
                    passes.spawn(run_pass(pass_id, remediator, ttl));
                }
                Some(joined) = passes.join_next(), if !passes.is_empty() => {
                    if let Err(e) = joined {
                        error!("Decision pass task failed: {}", e);
                    }
                }
                _ = sleep(until_next_midnight(&Local::now())), if self.daily_clear => {
                    let cleared = self.remediator.store().clear_settled().await;
                    info!(cleared, "Daily restart record reset");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopping, waiting for {} in-flight passes", passes.len());
        while let Some(joined) = passes.join_next().await {
            if let Err(e) = joined {
                error!("Decision pass task failed: {}", e);
            }
        }
    }
}

async fn run_pass(pass_id: u64, remediator: Remediator, record_ttl_secs: u64) {
    let report = remediator.run_pass().await;

    if report.observed > 0 || report.list_failed {
        info!(
            pass_id,
            observed = report.observed,
            restarted = report.restarted,
            failed = report.failed,
            scheduled = report.scheduled,
            waiting = report.waiting,
            skipped = report.skipped,
            limited = report.limited,
            list_failed = report.list_failed,
            "Pass complete"
        );
    } else {
        debug!(pass_id, "Pass complete, no unhealthy containers");
    }

    if record_ttl_secs > 0 {
        let evicted = remediator
            .store()
            .evict_unseen(Utc::now(), record_ttl_secs)
            .await;
        if evicted > 0 {
            info!(pass_id, evicted, "Evicted restart records of recovered containers");
        }
    }
}

/// Time from `now` until the next midnight in `now`'s time zone.
fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(now.timezone()).earliest())
        .and_then(|midnight| midnight.signed_duration_since(now).to_std().ok())
        .unwrap_or(ONE_DAY)
}
