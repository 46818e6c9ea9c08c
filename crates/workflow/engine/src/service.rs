//! Workflow service: the operation surface of the approval core
//!
//! Wraps the executor with definition and instance lifecycle
//! management. Definitions are structurally frozen once any instance
//! references them, a content item carries at most one active
//! instance, and definition names are unique. The HTTP layer that
//! fronts this service lives outside this repository.

use crate::executor::{Caller, TransitionExecutor, TransitionOutcome};
use crate::ports::{AuditSink, ContentPublisher, MetricsRecorder, WorkflowRepository};
use crate::state_graph::StateGraph;
use std::sync::Arc;
use workflow_types::{
    ContentId, DefinitionId, InstanceId, TransitionRule, WorkflowDefinition, WorkflowError,
    WorkflowInstance, WorkflowResult, WorkflowState,
};

/// Operation surface for definitions, instances, and transitions
pub struct WorkflowService<R, P, A> {
    repository: Arc<R>,
    executor: TransitionExecutor<R, P, A>,
}

impl<R, P, A> WorkflowService<R, P, A>
where
    R: WorkflowRepository,
    P: ContentPublisher,
    A: AuditSink,
{
    pub fn new(repository: Arc<R>, publisher: Arc<P>, audit: Arc<A>) -> Self {
        let executor = TransitionExecutor::new(repository.clone(), publisher, audit);
        Self {
            repository,
            executor,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.executor = self.executor.with_metrics(metrics);
        self
    }

    // ── Definitions ──────────────────────────────────────────────────

    /// Persist a new definition after validating it structurally.
    ///
    /// The name must be unique across definitions.
    pub async fn create_definition(
        &self,
        definition: WorkflowDefinition,
    ) -> WorkflowResult<DefinitionId> {
        definition.validate()?;
        if let Some(existing) = self
            .repository
            .find_definition_by_name(&definition.name)
            .await?
        {
            if existing.id != definition.id {
                return Err(WorkflowError::Validation(format!(
                    "a workflow definition named '{}' already exists",
                    definition.name
                )));
            }
        }
        self.repository.save_definition(&definition).await?;
        tracing::info!(
            definition_id = %definition.id,
            name = %definition.name,
            states = definition.state_count(),
            rules = definition.rule_count(),
            "Workflow definition created"
        );
        Ok(definition.id)
    }

    pub async fn get_definition(&self, id: &DefinitionId) -> WorkflowResult<WorkflowDefinition> {
        self.repository.load_definition(id).await
    }

    /// Add a state to an existing definition.
    ///
    /// Structural edits are refused once any instance references the
    /// definition; instances would otherwise observe a graph that
    /// shifted underneath them.
    pub async fn add_state(
        &self,
        definition_id: &DefinitionId,
        state: WorkflowState,
    ) -> WorkflowResult<()> {
        let mut definition = self.load_mutable_definition(definition_id).await?;
        definition.add_state(state)?;
        definition.validate()?;
        self.repository.save_definition(&definition).await
    }

    /// Add a transition rule to an existing definition.
    ///
    /// Subject to the same structural freeze as [`Self::add_state`].
    pub async fn add_rule(
        &self,
        definition_id: &DefinitionId,
        rule: TransitionRule,
    ) -> WorkflowResult<()> {
        let mut definition = self.load_mutable_definition(definition_id).await?;
        definition.add_rule(rule)?;
        self.repository.save_definition(&definition).await
    }

    /// Delete a definition. Refused while any instance references it.
    pub async fn delete_definition(&self, id: &DefinitionId) -> WorkflowResult<()> {
        if self.repository.has_instances(id).await? {
            return Err(WorkflowError::Validation(format!(
                "definition '{}' is referenced by workflow instances",
                id
            )));
        }
        self.repository.delete_definition(id).await?;
        tracing::info!(definition_id = %id, "Workflow definition deleted");
        Ok(())
    }

    async fn load_mutable_definition(
        &self,
        id: &DefinitionId,
    ) -> WorkflowResult<WorkflowDefinition> {
        let definition = self.repository.load_definition(id).await?;
        if self.repository.has_instances(id).await? {
            return Err(WorkflowError::Validation(format!(
                "definition '{}' is structurally frozen: instances reference it",
                id
            )));
        }
        Ok(definition)
    }

    // ── Instances ────────────────────────────────────────────────────

    /// Start a workflow instance for a content item.
    ///
    /// The definition must be active; the content item must not
    /// already have an active instance.
    pub async fn create_instance(
        &self,
        definition_id: &DefinitionId,
        content_id: ContentId,
        content_name: &str,
        content_type: &str,
        created_by: &str,
    ) -> WorkflowResult<WorkflowInstance> {
        let definition = self.repository.load_definition(definition_id).await?;
        if !definition.is_active {
            return Err(WorkflowError::Validation(format!(
                "definition '{}' is inactive and cannot spawn instances",
                definition_id
            )));
        }
        let graph = StateGraph::build(&definition)?;

        if let Some(existing) = self
            .repository
            .active_instance_for_content(&content_id)
            .await?
        {
            return Err(WorkflowError::Validation(format!(
                "content '{}' already has active workflow instance '{}'",
                content_id, existing.id
            )));
        }

        let instance = WorkflowInstance::new(
            definition_id.clone(),
            graph.initial_state().id.clone(),
            content_id,
            content_name,
            content_type,
            created_by,
        );
        self.repository.save_instance(&instance, 0).await?;
        tracing::info!(
            instance_id = %instance.id,
            definition_id = %definition_id,
            content_id = %instance.content_id,
            "Workflow instance created"
        );
        Ok(instance)
    }

    pub async fn get_instance(&self, id: &InstanceId) -> WorkflowResult<WorkflowInstance> {
        self.repository.load_instance(id).await
    }

    /// The active instance currently governing a content item
    pub async fn instance_for_content(
        &self,
        content_id: &ContentId,
    ) -> WorkflowResult<Option<WorkflowInstance>> {
        self.repository.active_instance_for_content(content_id).await
    }

    /// Cancel an instance without touching its content item
    pub async fn cancel_instance(&self, id: &InstanceId) -> WorkflowResult<WorkflowInstance> {
        let mut instance = self.repository.load_instance(id).await?;
        if !instance.is_active() {
            return Err(WorkflowError::Validation(format!(
                "instance '{}' is not active",
                id
            )));
        }
        let expected = instance.version;
        instance.cancel();
        instance.version = expected + 1;
        self.repository.save_instance(&instance, expected).await?;
        tracing::info!(instance_id = %id, "Workflow instance cancelled");
        Ok(instance)
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Active rules leaving the instance's current state, in sort
    /// order. Role gates are not applied here; callers see every edge
    /// and authorization happens at apply time.
    pub async fn available_transitions(
        &self,
        instance_id: &InstanceId,
    ) -> WorkflowResult<Vec<TransitionRule>> {
        let instance = self.repository.load_instance(instance_id).await?;
        let definition = self.repository.load_definition(&instance.definition_id).await?;
        let graph = StateGraph::build(&definition)?;
        Ok(graph
            .outgoing_rules(&instance.current_state)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Apply a transition rule on behalf of a caller
    pub async fn apply_transition(
        &self,
        instance_id: &InstanceId,
        rule_id: &workflow_types::RuleId,
        caller: &Caller,
        comment: Option<&str>,
    ) -> WorkflowResult<TransitionOutcome> {
        self.executor
            .apply_transition(instance_id, rule_id, caller, comment)
            .await
    }

    /// Reject the instance back to its definition's initial state
    pub async fn reject(
        &self,
        instance_id: &InstanceId,
        caller: &Caller,
        comment: Option<&str>,
    ) -> WorkflowResult<TransitionOutcome> {
        self.executor.reject(instance_id, caller, comment).await
    }
}
