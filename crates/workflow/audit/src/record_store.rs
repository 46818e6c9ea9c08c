//! Audit record persistence
//!
//! The record store is append-only: records are upserted by id, never
//! mutated, and only removed in bulk by age. The in-memory adapter
//! backs tests and local development.

use crate::consumer::NotificationHandler;
use crate::error::{AuditError, AuditResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::sync::Mutex;
use workflow_types::{AuditRecord, StateChangeEvent};

// ── Store port ───────────────────────────────────────────────────────

/// Durable store for processed audit records
#[async_trait]
pub trait NotificationRecordStore: Send + Sync {
    /// Insert or replace the record with the same id. Redelivered
    /// messages upsert the same record, so processing is idempotent.
    async fn save(&self, record: &AuditRecord) -> AuditResult<()>;

    /// All records, ordered by transition timestamp ascending
    async fn list(&self) -> AuditResult<Vec<AuditRecord>>;

    /// Delete records whose transition timestamp is older than `age`;
    /// returns how many were removed
    async fn purge_older_than(&self, age: Duration) -> AuditResult<usize>;
}

// ── In-memory adapter ────────────────────────────────────────────────

/// Vec-backed record store
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AuditResult<std::sync::MutexGuard<'_, Vec<AuditRecord>>> {
        self.records
            .lock()
            .map_err(|_| AuditError::Processing("record store lock poisoned".into()))
    }
}

#[async_trait]
impl NotificationRecordStore for InMemoryRecordStore {
    async fn save(&self, record: &AuditRecord) -> AuditResult<()> {
        let mut records = self.lock()?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn list(&self) -> AuditResult<Vec<AuditRecord>> {
        let mut records = self.lock()?.clone();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn purge_older_than(&self, age: Duration) -> AuditResult<usize> {
        let cutoff = Utc::now() - age;
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|r| r.timestamp >= cutoff);
        Ok(before - records.len())
    }
}

// ── Handler ──────────────────────────────────────────────────────────

/// The default notification handler: converts the wire event into an
/// audit record and persists it
pub struct StoreNotificationHandler<S> {
    store: Arc<S>,
}

impl<S> StoreNotificationHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> NotificationHandler for StoreNotificationHandler<S>
where
    S: NotificationRecordStore,
{
    async fn handle(&self, event: &StateChangeEvent) -> AuditResult<()> {
        let record = AuditRecord::from_event(event);
        self.store.save(&record).await?;
        tracing::debug!(
            content_id = %event.content_id,
            record_id = %record.id,
            approved = event.approved,
            "Audit record stored"
        );
        Ok(())
    }
}
