//! Restart state store.
//!
//! A single `tokio::sync::Mutex` guards every record. The primitive
//! `exists`/`insert`/`lookup` operations each take the lock on their own, so
//! a caller composing them is exposed to interleaving with other passes.
//! [`RestartStore::observe`] performs find-or-create and the caller's update
//! under one acquisition and is what the decision engine uses.

use crate::heal::types::{ContainerId, RestartRecord};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::debug;

use super::backoff::secs;

/// Shared, cloneable handle to the restart records.
#[derive(Debug, Clone, Default)]
pub struct RestartStore {
    records: Arc<Mutex<Vec<RestartRecord>>>,
}

impl RestartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.records.lock().await.iter().any(|r| r.id == id)
    }

    /// Append a record. Does not check for an existing record with the same
    /// id; use [`exists`](Self::exists) first or prefer [`observe`](Self::observe).
    pub async fn insert(&self, id: impl Into<ContainerId>, restart_count: u32, time: DateTime<Utc>) {
        let record = RestartRecord::new(id, restart_count, time);
        debug!(container_id = %record.id, restart_count, "inserting restart record");
        self.records.lock().await.push(record);
    }

    /// Mutable view of the first record for `id`. The store stays locked until
    /// the returned guard is dropped, so never hold it across a runtime call.
    pub async fn lookup(&self, id: &str) -> Option<MappedMutexGuard<'_, RestartRecord>> {
        let guard = self.records.lock().await;
        MutexGuard::try_map(guard, |records| records.iter_mut().find(|r| r.id == id)).ok()
    }

    /// Atomically find or create the record for `id` and run `f` against it.
    /// `f` receives `true` when the record was created by this call; an
    /// existing record is handed to `f` untouched.
    pub async fn observe<F, R>(&self, id: &str, name: &str, now: DateTime<Utc>, f: F) -> R
    where
        F: FnOnce(&mut RestartRecord, bool) -> R,
    {
        let mut records = self.records.lock().await;

        let (index, created) = match records.iter().position(|r| r.id == id) {
            Some(index) => (index, false),
            None => {
                let mut record = RestartRecord::new(id, 0, now);
                if !name.is_empty() {
                    record.name = name.to_string();
                }
                records.push(record);
                (records.len() - 1, true)
            }
        };

        f(&mut records[index], created)
    }

    /// Cloned view of every record, in insertion order.
    pub async fn snapshot(&self) -> Vec<RestartRecord> {
        self.records.lock().await.clone()
    }

    pub async fn find_by_name(&self, name: &str) -> Option<RestartRecord> {
        self.records
            .lock()
            .await
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Drop records whose container has not been reported unhealthy for
    /// longer than `ttl_secs`. Records with a restart in flight are kept.
    pub async fn evict_unseen(&self, now: DateTime<Utc>, ttl_secs: u64) -> usize {
        let ttl = secs(ttl_secs);
        let mut records = self.records.lock().await;
        let before = records.len();

        records.retain(|r| r.restarting || now.signed_duration_since(r.last_seen) <= ttl);

        let evicted = before - records.len();
        if evicted > 0 {
            debug!(evicted, remaining = records.len(), "evicted stale restart records");
        }
        evicted
    }

    /// Drop every record without a restart in flight. Returns how many were dropped.
    pub async fn clear_settled(&self) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.restarting);
        before - records.len()
    }
}
