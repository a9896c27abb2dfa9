//! Per-pass restart decisions.
//!
//! Each container reported unhealthy moves through an implicit state machine
//! carried by its [`RestartRecord`]:
//!
//! ```text
//!   Unknown ──restart──▶ Tracked ──schedule wait──▶ BackoffWaiting
//!                          ▲  │                         │
//!                          │  └──window elapsed──┐      │ wait elapsed
//!                          │                   restart  │
//!                          └──────────restart, count+1──┘
//! ```
//!
//! With a restart limit configured, an elapsed wait on a history that has
//! used up its restarts yields [`Decision::LimitReached`] instead.
//!
//! The decision and the in-flight flag are applied under one store lock
//! acquisition; the runtime call happens afterwards, without the lock.

use crate::container::{ContainerError, RuntimeGateway, UnhealthyContainer};
use crate::heal::backoff::{BackoffPolicy, add_secs};
use crate::heal::store::RestartStore;
use crate::heal::types::{
    Decision, PassReport, RecordCheckpoint, RestartFailurePolicy, RestartReason, RestartRecord,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default deadline for a single runtime call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Apply one observation of an unhealthy container to its record.
///
/// `created` is true when the record did not exist before this observation.
pub fn evaluate(
    record: &mut RestartRecord,
    created: bool,
    now: DateTime<Utc>,
    policy: &BackoffPolicy,
) -> Decision {
    if created {
        let rollback = record.checkpoint();
        record.restart_count = 0;
        record.restart_time = now;
        record.wait_time = None;
        record.restarting = true;
        return Decision::Restart {
            reason: RestartReason::FirstSeen,
            restart_count: 0,
            rollback,
        };
    }

    if record.restarting {
        // Still counts as seen, so eviction cannot forget an in-flight container.
        record.last_seen = record.last_seen.max(now);
        return Decision::Skip;
    }

    record.last_seen = now;

    if policy.is_stale(record.restart_time, now) {
        let rollback = record.checkpoint();
        record.restart_count = 0;
        record.restart_time = now;
        record.wait_time = None;
        record.restarting = true;
        return Decision::Restart {
            reason: RestartReason::WindowReset,
            restart_count: 0,
            rollback,
        };
    }

    match record.wait_time {
        None => {
            let wait_secs = policy.wait_secs(record.restart_count);
            let until = policy.wait_until(now, record.restart_count);
            record.wait_time = Some(until);
            Decision::ScheduleWait { wait_secs, until }
        }
        Some(until) if now < until => Decision::Waiting { until },
        Some(_) if policy.limit_reached(record.restart_count) => Decision::LimitReached {
            restart_count: record.restart_count,
            limit: policy.max_restarts,
        },
        Some(_) => {
            let rollback = record.checkpoint();
            record.restart_count = record.restart_count.saturating_add(1);
            record.restart_time = now;
            record.wait_time = None;
            record.restarting = true;
            Decision::Restart {
                reason: RestartReason::BackoffElapsed,
                restart_count: record.restart_count,
                rollback,
            }
        }
    }
}

/// Drives decision passes against a runtime gateway and a restart store.
#[derive(Clone)]
pub struct Remediator {
    gateway: Arc<dyn RuntimeGateway>,
    store: RestartStore,
    policy: BackoffPolicy,
    failure_policy: RestartFailurePolicy,
    call_timeout: Duration,
}

impl std::fmt::Debug for Remediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remediator")
            .field("policy", &self.policy)
            .field("failure_policy", &self.failure_policy)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl Remediator {
    pub fn new(gateway: Arc<dyn RuntimeGateway>, store: RestartStore, policy: BackoffPolicy) -> Self {
        Self {
            gateway,
            store,
            policy,
            failure_policy: RestartFailurePolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: RestartFailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn store(&self) -> &RestartStore {
        &self.store
    }

    /// Run one pass using the current wall clock.
    pub async fn run_pass(&self) -> PassReport {
        self.run_pass_at(Utc::now()).await
    }

    /// Run one pass as if the current time were `now`.
    ///
    /// Never fails: a listing error yields an empty report with
    /// `list_failed` set, and restart errors are counted per container.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> PassReport {
        let mut report = PassReport::default();

        let containers = match self.list_unhealthy().await {
            Ok(containers) => containers,
            Err(e) => {
                error!("Failed to list unhealthy containers: {}", e);
                report.list_failed = true;
                return report;
            }
        };

        report.observed = containers.len();

        for container in &containers {
            let decision = self.decide(container, now).await;
            report.record(&decision);

            if let Decision::Restart {
                reason,
                restart_count,
                rollback,
            } = decision
            {
                info!(
                    container_id = %container.id,
                    name = %container.display_name(),
                    status = %container.status,
                    restart_count,
                    "Restarting unhealthy container ({})",
                    reason
                );

                if self.issue_restart(container, now, rollback).await {
                    report.restarted += 1;
                } else {
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn list_unhealthy(&self) -> crate::container::Result<Vec<UnhealthyContainer>> {
        match tokio::time::timeout(self.call_timeout, self.gateway.list_unhealthy()).await {
            Ok(result) => result,
            Err(_) => Err(ContainerError::Timeout {
                operation: "list unhealthy containers",
                seconds: self.call_timeout.as_secs(),
            }),
        }
    }

    /// Evaluate the container against its record in one atomic store step.
    async fn decide(&self, container: &UnhealthyContainer, now: DateTime<Utc>) -> Decision {
        let policy = self.policy;
        let decision = self
            .store
            .observe(&container.id, &container.display_name(), now, |record, created| {
                evaluate(record, created, now, &policy)
            })
            .await;

        match &decision {
            Decision::Skip => {
                debug!(container_id = %container.id, "Restart already in flight, skipping");
            }
            Decision::ScheduleWait { wait_secs, until } => {
                info!(
                    container_id = %container.id,
                    name = %container.display_name(),
                    wait_secs,
                    "Container still unhealthy, next restart not before {}",
                    until
                );
            }
            Decision::Waiting { until } => {
                debug!(container_id = %container.id, "Backing off until {}", until);
            }
            Decision::LimitReached {
                restart_count,
                limit,
            } => {
                warn!(
                    container_id = %container.id,
                    name = %container.display_name(),
                    status = %container.status,
                    restart_count,
                    "Restart limit of {} reached, not restarting",
                    limit
                );
            }
            Decision::Restart { .. } => {}
        }

        decision
    }

    /// Issue the restart and clear the in-flight flag. Returns whether the
    /// runtime call succeeded.
    async fn issue_restart(
        &self,
        container: &UnhealthyContainer,
        issued_at: DateTime<Utc>,
        rollback: RecordCheckpoint,
    ) -> bool {
        let started = Instant::now();
        let result =
            match tokio::time::timeout(self.call_timeout, self.gateway.restart(&container.id)).await
            {
                Ok(result) => result,
                Err(_) => Err(ContainerError::Timeout {
                    operation: "restart",
                    seconds: self.call_timeout.as_secs(),
                }),
            };

        if let Err(e) = &result {
            error!(
                container_id = %container.id,
                name = %container.display_name(),
                "Failed to restart container: {}",
                e
            );
        }

        match self.store.lookup(&container.id).await {
            Some(mut record) => {
                record.restarting = false;
                let finished_at = add_secs(issued_at, started.elapsed().as_secs());
                record.last_seen = record.last_seen.max(finished_at);
                if result.is_err() && self.failure_policy == RestartFailurePolicy::Rollback {
                    record.restore(&rollback);
                    debug!(container_id = %container.id, "Rolled back restart bookkeeping");
                }
            }
            None => warn!(
                container_id = %container.id,
                "Restart record disappeared while restart was in flight"
            ),
        }

        result.is_ok()
    }
}
