//! In-memory adapters for the engine's ports
//!
//! Deterministic implementations used by tests and local development.
//! The repository honors the same compare-and-swap contract a real
//! store would; the recording publisher and audit sink count calls
//! and can be armed to fail the next operation.

use crate::outbox::{OutboxEntry, OutboxStatus};
use crate::ports::{AuditSink, ContentPublisher, WorkflowRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use workflow_types::{
    ContentId, DefinitionId, InstanceId, InstanceStatus, StateChangeEvent, WorkflowDefinition,
    WorkflowError, WorkflowInstance, WorkflowResult,
};

// ── Repository ───────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    definitions: HashMap<DefinitionId, WorkflowDefinition>,
    instances: HashMap<InstanceId, WorkflowInstance>,
    outbox: Vec<OutboxEntry>,
}

/// HashMap-backed repository with CAS instance saves
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_version(
        tables: &Tables,
        instance: &WorkflowInstance,
        expected_version: u64,
    ) -> WorkflowResult<()> {
        if let Some(stored) = tables.instances.get(&instance.id) {
            if stored.version != expected_version {
                return Err(WorkflowError::VersionConflict {
                    instance: instance.id.clone(),
                    expected: expected_version,
                    found: stored.version,
                });
            }
        } else if expected_version != 0 {
            return Err(WorkflowError::VersionConflict {
                instance: instance.id.clone(),
                expected: expected_version,
                found: 0,
            });
        }
        Ok(())
    }

    fn lock(&self) -> WorkflowResult<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| WorkflowError::Repository("store lock poisoned".into()))
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryRepository {
    async fn load_definition(&self, id: &DefinitionId) -> WorkflowResult<WorkflowDefinition> {
        self.lock()?
            .definitions
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::DefinitionNotFound(id.clone()))
    }

    async fn find_definition_by_name(
        &self,
        name: &str,
    ) -> WorkflowResult<Option<WorkflowDefinition>> {
        Ok(self
            .lock()?
            .definitions
            .values()
            .find(|d| d.name == name)
            .cloned())
    }

    async fn save_definition(&self, definition: &WorkflowDefinition) -> WorkflowResult<()> {
        self.lock()?
            .definitions
            .insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    async fn delete_definition(&self, id: &DefinitionId) -> WorkflowResult<()> {
        if self.lock()?.definitions.remove(id).is_none() {
            return Err(WorkflowError::DefinitionNotFound(id.clone()));
        }
        Ok(())
    }

    async fn load_instance(&self, id: &InstanceId) -> WorkflowResult<WorkflowInstance> {
        self.lock()?
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::InstanceNotFound(id.clone()))
    }

    async fn active_instance_for_content(
        &self,
        content_id: &ContentId,
    ) -> WorkflowResult<Option<WorkflowInstance>> {
        Ok(self
            .lock()?
            .instances
            .values()
            .find(|i| i.content_id == *content_id && i.status == InstanceStatus::Active)
            .cloned())
    }

    async fn has_instances(&self, definition_id: &DefinitionId) -> WorkflowResult<bool> {
        Ok(self
            .lock()?
            .instances
            .values()
            .any(|i| i.definition_id == *definition_id))
    }

    async fn has_active_instances(&self, definition_id: &DefinitionId) -> WorkflowResult<bool> {
        Ok(self
            .lock()?
            .instances
            .values()
            .any(|i| i.definition_id == *definition_id && i.status == InstanceStatus::Active))
    }

    async fn save_instance(
        &self,
        instance: &WorkflowInstance,
        expected_version: u64,
    ) -> WorkflowResult<()> {
        let mut tables = self.lock()?;
        Self::check_version(&tables, instance, expected_version)?;
        tables.instances.insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn save_instance_with_outbox(
        &self,
        instance: &WorkflowInstance,
        expected_version: u64,
        entries: &[OutboxEntry],
    ) -> WorkflowResult<()> {
        let mut tables = self.lock()?;
        Self::check_version(&tables, instance, expected_version)?;
        tables.instances.insert(instance.id.clone(), instance.clone());
        tables.outbox.extend_from_slice(entries);
        Ok(())
    }

    async fn pending_outbox(&self, limit: usize) -> WorkflowResult<Vec<OutboxEntry>> {
        Ok(self
            .lock()?
            .outbox
            .iter()
            .filter(|e| e.status == OutboxStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_outbox_entry(&self, entry: &OutboxEntry) -> WorkflowResult<()> {
        let mut tables = self.lock()?;
        match tables.outbox.iter_mut().find(|e| e.id == entry.id) {
            Some(stored) => {
                *stored = entry.clone();
                Ok(())
            }
            None => Err(WorkflowError::Repository(format!(
                "outbox entry '{}' not found",
                entry.id
            ))),
        }
    }
}

// ── Recording publisher ──────────────────────────────────────────────

/// Counts publish and unpublish calls; can fail the next one on demand
#[derive(Default)]
pub struct RecordingPublisher {
    published: AtomicU64,
    unpublished: AtomicU64,
    fail_publish: AtomicBool,
    fail_unpublish: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_calls(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub fn unpublish_calls(&self) -> u64 {
        self.unpublished.load(Ordering::SeqCst)
    }

    /// Arm a one-shot failure on the next publish
    pub fn fail_next_publish(&self) {
        self.fail_publish.store(true, Ordering::SeqCst);
    }

    /// Arm a one-shot failure on the next unpublish
    pub fn fail_next_unpublish(&self) {
        self.fail_unpublish.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentPublisher for RecordingPublisher {
    async fn publish(&self, _content_id: &ContentId, _content_type: &str) -> bool {
        if self.fail_publish.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.published.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn unpublish(&self, _content_id: &ContentId, _content_type: &str) -> bool {
        if self.fail_unpublish.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.unpublished.fetch_add(1, Ordering::SeqCst);
        true
    }
}

// ── Recording audit sink ─────────────────────────────────────────────

/// Captures published state-change events in order
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<StateChangeEvent>>,
    fail_next: AtomicBool,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, oldest first
    pub fn events(&self) -> Vec<StateChangeEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Arm a one-shot failure on the next publish
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn publish(&self, event: &StateChangeEvent) -> bool {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_types::{StateId, WorkflowState};

    fn make_instance() -> WorkflowInstance {
        WorkflowInstance::new(
            DefinitionId::new("def-1"),
            StateId::new("draft"),
            ContentId::new("c-1"),
            "Post",
            "post",
            "alice",
        )
    }

    #[tokio::test]
    async fn test_instance_cas_save() {
        let repo = InMemoryRepository::new();
        let mut instance = make_instance();
        repo.save_instance(&instance, 0).await.unwrap();

        instance.version = 1;
        repo.save_instance(&instance, 0).await.unwrap();

        // Stale expected version fails
        let err = repo.save_instance(&instance, 0).await.unwrap_err();
        assert!(matches!(err, WorkflowError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn test_fresh_instance_requires_expected_zero() {
        let repo = InMemoryRepository::new();
        let instance = make_instance();
        let err = repo.save_instance(&instance, 3).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::VersionConflict { found: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_active_instance_lookup_skips_inactive() {
        let repo = InMemoryRepository::new();
        let mut instance = make_instance();
        instance.cancel();
        repo.save_instance(&instance, 0).await.unwrap();

        let found = repo
            .active_instance_for_content(&ContentId::new("c-1"))
            .await
            .unwrap();
        assert!(found.is_none());
        assert!(repo.has_instances(&instance.definition_id).await.unwrap());
        assert!(!repo
            .has_active_instances(&instance.definition_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_definition_roundtrip_and_delete() {
        let repo = InMemoryRepository::new();
        let mut def = WorkflowDefinition::new("Review");
        def.add_state(WorkflowState::new("draft", "Draft").initial())
            .unwrap();
        repo.save_definition(&def).await.unwrap();

        let loaded = repo.load_definition(&def.id).await.unwrap();
        assert_eq!(loaded.name, "Review");
        assert!(repo
            .find_definition_by_name("Review")
            .await
            .unwrap()
            .is_some());

        repo.delete_definition(&def.id).await.unwrap();
        let err = repo.load_definition(&def.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::DefinitionNotFound(_)));
    }

    #[tokio::test]
    async fn test_outbox_pending_and_update() {
        use crate::outbox::{OutboxEntry, OutboxIntent};

        let repo = InMemoryRepository::new();
        let instance = make_instance();
        let entry = OutboxEntry::new(
            instance.id.clone(),
            OutboxIntent::Publish {
                content_id: ContentId::new("c-1"),
                content_type: "post".into(),
            },
        );
        repo.save_instance_with_outbox(&instance, 0, &[entry.clone()])
            .await
            .unwrap();

        let pending = repo.pending_outbox(10).await.unwrap();
        assert_eq!(pending.len(), 1);

        let mut done = pending[0].clone();
        done.mark_done();
        repo.update_outbox_entry(&done).await.unwrap();
        assert!(repo.pending_outbox(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recording_publisher_one_shot_failure() {
        let publisher = RecordingPublisher::new();
        publisher.fail_next_publish();
        assert!(!publisher.publish(&ContentId::new("c-1"), "post").await);
        assert!(publisher.publish(&ContentId::new("c-1"), "post").await);
        assert_eq!(publisher.publish_calls(), 1);
    }
}
