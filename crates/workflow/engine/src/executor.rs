//! Transition executor: the heart of the approval core
//!
//! `apply_transition` validates, authorizes, mutates, and commits in
//! one pass; the commit (instance + outbox entries) is the durability
//! boundary. Publish side effects and audit emission drain inline
//! afterwards in their own failure domain: their failures surface as
//! boolean flags on the outcome and never roll the transition back.

use crate::authorizer::TransitionAuthorizer;
use crate::outbox::{apply_intent, OutboxEntry, OutboxIntent};
use crate::ports::{counters, AuditSink, ContentPublisher, MetricsRecorder, NoopMetrics,
    WorkflowRepository};
use crate::state_graph::StateGraph;
use chrono::Utc;
use std::sync::Arc;
use workflow_types::{
    InstanceId, RuleId, StateChangeEvent, TransitionLogEntry, WorkflowError, WorkflowInstance,
    WorkflowResult, WorkflowState,
};

// ── Caller ───────────────────────────────────────────────────────────

/// The authenticated actor applying a transition
#[derive(Clone, Debug)]
pub struct Caller {
    pub name: String,
    pub roles: Vec<String>,
}

impl Caller {
    pub fn new<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Outcome ──────────────────────────────────────────────────────────

/// Result of a committed transition.
///
/// The flags report the decoupled side effects: `content_published`
/// is true only when a publish/unpublish action was attempted and
/// succeeded; `audit_published` reports delivery of the state-change
/// event to the broker.
#[derive(Clone, Debug)]
pub struct TransitionOutcome {
    pub instance: WorkflowInstance,
    pub content_published: bool,
    pub audit_published: bool,
}

// ── Executor ─────────────────────────────────────────────────────────

/// Orchestrates validation, authorization, state mutation, side
/// effects, and audit emission
pub struct TransitionExecutor<R, P, A> {
    repository: Arc<R>,
    publisher: Arc<P>,
    audit: Arc<A>,
    authorizer: TransitionAuthorizer,
    metrics: Arc<dyn MetricsRecorder>,
}

impl<R, P, A> TransitionExecutor<R, P, A>
where
    R: WorkflowRepository,
    P: ContentPublisher,
    A: AuditSink,
{
    pub fn new(repository: Arc<R>, publisher: Arc<P>, audit: Arc<A>) -> Self {
        Self {
            repository,
            publisher,
            audit,
            authorizer: TransitionAuthorizer::new(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Apply a transition rule to an instance.
    ///
    /// Validation, not-found, conflict, and authorization failures
    /// abort before any mutation. After the commit, the publish side
    /// effect and the audit event drain best-effort.
    pub async fn apply_transition(
        &self,
        instance_id: &InstanceId,
        rule_id: &RuleId,
        caller: &Caller,
        comment: Option<&str>,
    ) -> WorkflowResult<TransitionOutcome> {
        let mut instance = self.repository.load_instance(instance_id).await?;
        if instance.status == workflow_types::InstanceStatus::Cancelled {
            return Err(WorkflowError::Validation(format!(
                "instance '{}' is cancelled",
                instance_id
            )));
        }

        let definition = self.repository.load_definition(&instance.definition_id).await?;
        let graph = StateGraph::build(&definition)?;

        let rule = graph
            .rule(rule_id)
            .ok_or_else(|| WorkflowError::RuleNotFound(rule_id.clone()))?
            .clone();

        if rule.from_state != instance.current_state {
            self.metrics.incr(counters::TRANSITIONS_DENIED);
            return Err(WorkflowError::StateConflict {
                expected: rule.from_state.clone(),
                actual: instance.current_state.clone(),
            });
        }
        if !rule.is_active {
            return Err(WorkflowError::Validation(format!(
                "transition rule '{}' is inactive",
                rule.id
            )));
        }
        if rule.requires_comment && is_blank(comment) {
            return Err(WorkflowError::Validation(format!(
                "transition rule '{}' requires a comment",
                rule.id
            )));
        }
        if !self.authorizer.authorize(&rule, &caller.roles) {
            self.metrics.incr(counters::TRANSITIONS_DENIED);
            return Err(WorkflowError::Unauthorized(rule.id.clone()));
        }

        let source = graph
            .state(&rule.from_state)
            .ok_or_else(|| WorkflowError::StateNotFound(rule.from_state.clone()))?
            .clone();
        let target = graph
            .state(&rule.to_state)
            .ok_or_else(|| WorkflowError::StateNotFound(rule.to_state.clone()))?
            .clone();

        let description = if rule.description.is_empty() {
            format!("{} -> {}", source.name, target.name)
        } else {
            rule.description.clone()
        };

        let comment = comment.filter(|c| !c.trim().is_empty()).map(str::to_string);
        let entry = TransitionLogEntry {
            from: source.state_key.clone(),
            to: target.state_key.clone(),
            rule_id: Some(rule.id.clone()),
            actor: caller.name.clone(),
            comment: comment.clone(),
            rejected: false,
            timestamp: Utc::now(),
        };
        let event = build_event(&instance, &source, &target, &description, caller, true, comment);

        self.commit_and_drain(instance_id, &mut instance, &source, &target, entry, event)
            .await
            .map(|outcome| {
                self.metrics.incr(counters::TRANSITIONS_APPLIED);
                tracing::info!(
                    instance_id = %outcome.instance.id,
                    rule_id = %rule.id,
                    from = %source.state_key,
                    to = %target.state_key,
                    content_published = outcome.content_published,
                    audit_published = outcome.audit_published,
                    "Transition applied"
                );
                outcome
            })
    }

    /// Force an instance back to its definition's initial state.
    ///
    /// Rejection is always legal from any non-initial state and
    /// ignores the rule graph by design. The audit event is emitted
    /// with `approved = false`, and the state left is recorded in the
    /// transition log.
    pub async fn reject(
        &self,
        instance_id: &InstanceId,
        caller: &Caller,
        comment: Option<&str>,
    ) -> WorkflowResult<TransitionOutcome> {
        let mut instance = self.repository.load_instance(instance_id).await?;
        if instance.status == workflow_types::InstanceStatus::Cancelled {
            return Err(WorkflowError::Validation(format!(
                "instance '{}' is cancelled",
                instance_id
            )));
        }

        let definition = self.repository.load_definition(&instance.definition_id).await?;
        let graph = StateGraph::build(&definition)?;

        let source = graph
            .state(&instance.current_state)
            .ok_or_else(|| WorkflowError::StateNotFound(instance.current_state.clone()))?
            .clone();
        let target = graph.initial_state().clone();

        if source.id == target.id {
            return Err(WorkflowError::Validation(format!(
                "instance '{}' is already at the initial state",
                instance_id
            )));
        }

        let description = format!("Rejected back to {}", target.name);
        let comment = comment.filter(|c| !c.trim().is_empty()).map(str::to_string);
        let entry = TransitionLogEntry {
            from: source.state_key.clone(),
            to: target.state_key.clone(),
            rule_id: None,
            actor: caller.name.clone(),
            comment: comment.clone(),
            rejected: true,
            timestamp: Utc::now(),
        };
        let event = build_event(&instance, &source, &target, &description, caller, false, comment);

        self.commit_and_drain(instance_id, &mut instance, &source, &target, entry, event)
            .await
            .map(|outcome| {
                self.metrics.incr(counters::TRANSITIONS_REJECTED);
                tracing::info!(
                    instance_id = %outcome.instance.id,
                    from = %source.state_key,
                    to = %target.state_key,
                    "Transition rejected to initial state"
                );
                outcome
            })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Mutate the instance, commit it atomically with the outbox
    /// entries, then drain the fresh entries inline.
    async fn commit_and_drain(
        &self,
        instance_id: &InstanceId,
        instance: &mut WorkflowInstance,
        source: &WorkflowState,
        target: &WorkflowState,
        entry: TransitionLogEntry,
        event: StateChangeEvent,
    ) -> WorkflowResult<TransitionOutcome> {
        let expected_version = instance.version;
        instance.enter_state(target.id.clone(), entry, target.is_final);
        instance.version = expected_version + 1;

        let mut entries = Vec::new();
        if let Some(intent) = side_effect_intent(instance, source, target) {
            entries.push(OutboxEntry::new(instance_id.clone(), intent));
        }
        entries.push(OutboxEntry::new(
            instance_id.clone(),
            OutboxIntent::Audit { event },
        ));

        // Durability boundary: everything before this call is
        // side-effect free, everything after it fails soft.
        self.repository
            .save_instance_with_outbox(instance, expected_version, &entries)
            .await?;

        let mut content_published = false;
        let mut audit_published = false;
        for mut entry in entries {
            entry.record_attempt();
            let ok = apply_intent(self.publisher.as_ref(), self.audit.as_ref(), &entry.intent)
                .await;
            if ok {
                entry.mark_done();
                match entry.intent {
                    OutboxIntent::Audit { .. } => audit_published = true,
                    _ => content_published = true,
                }
            } else {
                match entry.intent {
                    OutboxIntent::Audit { .. } => {
                        self.metrics.incr(counters::AUDIT_PUBLISH_FAILURES)
                    }
                    _ => self.metrics.incr(counters::SIDE_EFFECT_FAILURES),
                }
                tracing::warn!(
                    instance_id = %instance_id,
                    intent = entry.intent.kind(),
                    attempts = entry.attempts,
                    "Side effect failed; entry left pending for the relay"
                );
            }
            if let Err(err) = self.repository.update_outbox_entry(&entry).await {
                tracing::warn!(
                    instance_id = %instance_id,
                    entry_id = %entry.id,
                    error = %err,
                    "Failed to update outbox entry after inline drain"
                );
            }
        }

        Ok(TransitionOutcome {
            instance: instance.clone(),
            content_published,
            audit_published,
        })
    }
}

/// Whether moving from `source` to `target` needs a publish action
fn side_effect_intent(
    instance: &WorkflowInstance,
    source: &WorkflowState,
    target: &WorkflowState,
) -> Option<OutboxIntent> {
    let source_live = source.is_published || source.is_final;
    let target_live = target.is_published || target.is_final;

    if target_live {
        Some(OutboxIntent::Publish {
            content_id: instance.content_id.clone(),
            content_type: instance.content_type.clone(),
        })
    } else if source_live {
        Some(OutboxIntent::Unpublish {
            content_id: instance.content_id.clone(),
            content_type: instance.content_type.clone(),
        })
    } else {
        None
    }
}

fn build_event(
    instance: &WorkflowInstance,
    source: &WorkflowState,
    target: &WorkflowState,
    description: &str,
    caller: &Caller,
    approved: bool,
    comment: Option<String>,
) -> StateChangeEvent {
    StateChangeEvent {
        content_id: instance.content_id.clone(),
        content_name: instance.content_name.clone(),
        from_state: source.name.clone(),
        to_state: target.name.clone(),
        transition_description: description.to_string(),
        reviewed_by: caller.name.clone(),
        approved,
        timestamp: Utc::now(),
        comments: comment,
        success: true,
        error_message: None,
    }
}

fn is_blank(comment: Option<&str>) -> bool {
    comment.map(str::trim).unwrap_or("").is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryRepository, RecordingAuditSink, RecordingPublisher};
    use workflow_types::{
        ContentId, InstanceStatus, RoleSet, TransitionRule, WorkflowDefinition, WorkflowState,
    };

    struct Fixture {
        repository: Arc<InMemoryRepository>,
        publisher: Arc<RecordingPublisher>,
        audit: Arc<RecordingAuditSink>,
        executor: TransitionExecutor<InMemoryRepository, RecordingPublisher, RecordingAuditSink>,
        instance_id: InstanceId,
        submit: RuleId,
        approve: RuleId,
    }

    /// Draft(initial) -> Review -> Published(published, final), with a
    /// comment required on approval and an Admin gate on a send-back
    /// edge.
    async fn make_fixture() -> Fixture {
        let mut def = WorkflowDefinition::new("Editorial Review");
        def.add_state(WorkflowState::new("draft", "Draft").initial())
            .unwrap();
        def.add_state(WorkflowState::new("review", "Review").with_sort_order(1))
            .unwrap();
        def.add_state(
            WorkflowState::new("published", "Published")
                .published()
                .terminal()
                .with_sort_order(2),
        )
        .unwrap();

        let draft = def.state_by_key("draft").unwrap().id.clone();
        let review = def.state_by_key("review").unwrap().id.clone();
        let published = def.state_by_key("published").unwrap().id.clone();

        let submit = TransitionRule::new(draft.clone(), review.clone());
        let submit_id = submit.id.clone();
        def.add_rule(submit).unwrap();

        let approve = TransitionRule::new(review.clone(), published.clone())
            .with_description("Approve and publish")
            .with_required_comment();
        let approve_id = approve.id.clone();
        def.add_rule(approve).unwrap();

        def.add_rule(
            TransitionRule::new(published, draft)
                .with_allowed_roles(RoleSet::from_roles(["Admin"]))
                .with_description("Pull back"),
        )
        .unwrap();

        let repository = Arc::new(InMemoryRepository::new());
        repository.save_definition(&def).await.unwrap();

        let instance = WorkflowInstance::new(
            def.id.clone(),
            def.initial_state().unwrap().id.clone(),
            ContentId::new("content-1"),
            "Launch announcement",
            "post",
            "alice",
        );
        let instance_id = instance.id.clone();
        repository.save_instance(&instance, 0).await.unwrap();

        let publisher = Arc::new(RecordingPublisher::new());
        let audit = Arc::new(RecordingAuditSink::new());
        let executor =
            TransitionExecutor::new(repository.clone(), publisher.clone(), audit.clone());

        Fixture {
            repository,
            publisher,
            audit,
            executor,
            instance_id,
            submit: submit_id,
            approve: approve_id,
        }
    }

    fn editor() -> Caller {
        Caller::new("bob", ["Editor"])
    }

    #[tokio::test]
    async fn test_scenario_draft_review_published() {
        let fx = make_fixture().await;

        // Draft -> Review: no comment needed, no side effect
        let outcome = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.submit, &editor(), Some(""))
            .await
            .unwrap();
        assert!(!outcome.content_published);
        assert!(outcome.audit_published);
        assert_eq!(fx.publisher.publish_calls(), 0);
        assert_eq!(fx.publisher.unpublish_calls(), 0);

        // Review -> Published without comment fails validation
        let err = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.approve, &editor(), Some(""))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        // Instance unchanged by the failure
        let inst = fx.repository.load_instance(&fx.instance_id).await.unwrap();
        assert_eq!(inst.transition_count(), 1);

        // Review -> Published with a comment publishes exactly once
        let outcome = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.approve, &editor(), Some("approved"))
            .await
            .unwrap();
        assert!(outcome.content_published);
        assert_eq!(outcome.instance.status, InstanceStatus::Completed);
        assert_eq!(fx.publisher.publish_calls(), 1);

        let events = fx.audit.events();
        assert_eq!(events.len(), 2);
        assert!(events[1].approved);
        assert_eq!(events[1].to_state, "Published");
        assert_eq!(events[1].comments.as_deref(), Some("approved"));
    }

    #[tokio::test]
    async fn test_wrong_source_state_is_conflict() {
        let fx = make_fixture().await;

        // approve departs from Review, instance is at Draft
        let err = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.approve, &editor(), Some("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::StateConflict { .. }));

        let inst = fx.repository.load_instance(&fx.instance_id).await.unwrap();
        assert_eq!(inst.version, 0);
        assert_eq!(inst.transition_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_rule_and_instance() {
        let fx = make_fixture().await;

        let err = fx
            .executor
            .apply_transition(&fx.instance_id, &RuleId::new("ghost"), &editor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::RuleNotFound(_)));

        let err = fx
            .executor
            .apply_transition(&InstanceId::new("ghost"), &fx.submit, &editor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InstanceNotFound(_)));
    }

    #[tokio::test]
    async fn test_inactive_rule_is_validation_error() {
        let fx = make_fixture().await;

        let mut def = fx
            .repository
            .find_definition_by_name("Editorial Review")
            .await
            .unwrap()
            .unwrap();
        let idx = def.rules.iter().position(|r| r.id == fx.submit).unwrap();
        def.rules[idx].is_active = false;
        fx.repository.save_definition(&def).await.unwrap();

        let err = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.submit, &editor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_role_gate_denies_then_authorizes_case_insensitively() {
        let fx = make_fixture().await;
        fx.executor
            .apply_transition(&fx.instance_id, &fx.submit, &editor(), None)
            .await
            .unwrap();
        fx.executor
            .apply_transition(&fx.instance_id, &fx.approve, &editor(), Some("ok"))
            .await
            .unwrap();

        let def = fx
            .repository
            .find_definition_by_name("Editorial Review")
            .await
            .unwrap()
            .unwrap();
        let pull_back = def
            .rules
            .iter()
            .find(|r| r.description == "Pull back")
            .unwrap()
            .id
            .clone();

        let err = fx
            .executor
            .apply_transition(&fx.instance_id, &pull_back, &editor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));

        let admin = Caller::new("carol", ["ADMIN"]);
        let outcome = fx
            .executor
            .apply_transition(&fx.instance_id, &pull_back, &admin, None)
            .await
            .unwrap();
        // Published -> Draft unpublishes exactly once
        assert!(outcome.content_published);
        assert_eq!(fx.publisher.unpublish_calls(), 1);
        assert_eq!(outcome.instance.status, InstanceStatus::Active);
    }

    #[tokio::test]
    async fn test_side_effect_failure_does_not_roll_back() {
        let fx = make_fixture().await;
        fx.executor
            .apply_transition(&fx.instance_id, &fx.submit, &editor(), None)
            .await
            .unwrap();

        fx.publisher.fail_next_publish();
        let outcome = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.approve, &editor(), Some("go"))
            .await
            .unwrap();

        assert!(!outcome.content_published);
        assert!(outcome.audit_published);
        // The transition itself is committed
        let inst = fx.repository.load_instance(&fx.instance_id).await.unwrap();
        assert_eq!(inst.status, InstanceStatus::Completed);
        // The publish intent stays pending for the relay
        let pending = fx.repository.pending_outbox(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].intent.kind(), "publish");
        assert_eq!(pending[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_audit_failure_is_flagged_not_fatal() {
        let fx = make_fixture().await;
        fx.audit.fail_next();

        let outcome = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.submit, &editor(), None)
            .await
            .unwrap();
        assert!(!outcome.audit_published);

        let inst = fx.repository.load_instance(&fx.instance_id).await.unwrap();
        assert_eq!(inst.transition_count(), 1);
    }

    #[tokio::test]
    async fn test_reject_returns_to_initial_with_unpublish() {
        let fx = make_fixture().await;
        fx.executor
            .apply_transition(&fx.instance_id, &fx.submit, &editor(), None)
            .await
            .unwrap();
        fx.executor
            .apply_transition(&fx.instance_id, &fx.approve, &editor(), Some("ok"))
            .await
            .unwrap();

        let outcome = fx
            .executor
            .reject(&fx.instance_id, &editor(), Some("not ready"))
            .await
            .unwrap();

        let inst = &outcome.instance;
        assert_eq!(inst.status, InstanceStatus::Active);
        let last = inst.last_transition().unwrap();
        assert!(last.rejected);
        assert_eq!(last.from, "published");
        assert_eq!(last.to, "draft");
        assert!(last.rule_id.is_none());

        assert_eq!(fx.publisher.unpublish_calls(), 1);
        let events = fx.audit.events();
        let rejection = events.last().unwrap();
        assert!(!rejection.approved);
        assert_eq!(rejection.comments.as_deref(), Some("not ready"));
    }

    #[tokio::test]
    async fn test_reject_from_initial_state_fails() {
        let fx = make_fixture().await;
        let err = fx
            .executor
            .reject(&fx.instance_id, &editor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_version_bumps_on_every_transition() {
        let fx = make_fixture().await;
        let outcome = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.submit, &editor(), None)
            .await
            .unwrap();
        assert_eq!(outcome.instance.version, 1);

        let outcome = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.approve, &editor(), Some("ok"))
            .await
            .unwrap();
        assert_eq!(outcome.instance.version, 2);
    }

    #[tokio::test]
    async fn test_cancelled_instance_cannot_transition() {
        let fx = make_fixture().await;
        let mut inst = fx.repository.load_instance(&fx.instance_id).await.unwrap();
        inst.cancel();
        let version = inst.version;
        inst.version += 1;
        fx.repository.save_instance(&inst, version).await.unwrap();

        let err = fx
            .executor
            .apply_transition(&fx.instance_id, &fx.submit, &editor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
}
