//! Core workflow engine structure and shared transition helpers.

use super::config::EngineConfig;
use super::gate::{GateDecision, evaluate_gate, unreachable_reason};
use super::notify::{Notifier, TransitionEvent, TransitionEventType, dispatch};
use crate::error::{WorkflowError, WorkflowResult};
use crate::instance::{
    ConfigurationWarning, FormInstance, InstanceStore, InstanceVersion, VersionedInstance,
};
use crate::permissions::{PermissionResolver, ResolvedActor};
use crate::storage::{StorageError, StorageProvider};
use crate::template::{FormTemplate, FormValidator, TemplateStore, WorkflowStepConfig};
use crate::tenant::{DirectoryStore, RequestContext};
use chrono::{DateTime, TimeDelta, Utc};
use log::{error, warn};
use std::sync::Arc;

/// Form workflow state machine over pluggable directory, template and
/// instance storage.
///
/// ```rust
/// use std::sync::Arc;
/// use serde_json::json;
/// use tenant_workflow::storage::InMemoryStorage;
/// use tenant_workflow::template::{FormTemplate, InMemoryTemplateStore};
/// use tenant_workflow::tenant::{InMemoryDirectory, Membership, RequestContext, Role};
/// use tenant_workflow::workflow::WorkflowEngine;
/// use tenant_workflow::instance::InstanceStatus;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let directory = Arc::new(InMemoryDirectory::new());
/// directory.add_role(Role::global("teacher", "teacher")).await;
/// directory.upsert_membership(Membership::new("alice", "school-a", "teacher")).await;
///
/// let templates = Arc::new(InMemoryTemplateStore::new());
/// templates.register(FormTemplate::new("feedback", 1, "Feedback")).await?;
///
/// let engine = WorkflowEngine::new(directory, templates, Arc::new(InMemoryStorage::new()));
/// let ctx = RequestContext::new("school-a", "alice");
/// let draft = engine.create_draft(&ctx, "feedback", json!({})).await?;
/// let done = engine.submit(&ctx, &draft.instance.id, None).await?;
/// assert_eq!(done.instance.status, InstanceStatus::Completed);
/// # Ok(())
/// # }
/// ```
pub struct WorkflowEngine<D, T, S> {
    pub(super) resolver: PermissionResolver<D>,
    pub(super) templates: Arc<T>,
    pub(super) instances: InstanceStore<S>,
    pub(super) notifiers: Vec<Arc<dyn Notifier>>,
    pub(super) config: EngineConfig,
}

/// Result of evaluating the current step's gate for an instance.
pub(super) struct ApprovalCheck {
    pub template: Arc<FormTemplate>,
    pub step: WorkflowStepConfig,
    pub decision: GateDecision,
}

impl<D, T, S> WorkflowEngine<D, T, S>
where
    D: DirectoryStore,
    T: TemplateStore,
    S: StorageProvider,
    S::Error: Into<StorageError>,
{
    /// Engine with the default configuration and no notifiers.
    pub fn new(directory: Arc<D>, templates: Arc<T>, storage: Arc<S>) -> Self {
        Self::from_parts(
            directory,
            templates,
            storage,
            EngineConfig::default(),
            Vec::new(),
        )
    }

    pub(super) fn from_parts(
        directory: Arc<D>,
        templates: Arc<T>,
        storage: Arc<S>,
        config: EngineConfig,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        let resolver = if config.role_cache {
            PermissionResolver::new(directory)
        } else {
            PermissionResolver::without_cache(directory)
        };
        Self {
            resolver,
            templates,
            instances: InstanceStore::new(storage),
            notifiers,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The permission resolver the engine gates transitions with.
    pub fn resolver(&self) -> &PermissionResolver<D> {
        &self.resolver
    }

    pub fn instance_store(&self) -> &InstanceStore<S> {
        &self.instances
    }

    pub(super) async fn require_member(&self, ctx: &RequestContext) -> WorkflowResult<ResolvedActor> {
        self.resolver
            .resolve_actor(ctx.actor_id(), ctx.tenant_id())
            .await
            .ok_or_else(|| {
                WorkflowError::permission_denied(
                    ctx.actor_id(),
                    format!("no active membership in tenant '{}'", ctx.tenant_id()),
                )
            })
    }

    pub(super) async fn load_template(
        &self,
        template_id: &str,
        version: Option<u32>,
    ) -> WorkflowResult<Arc<FormTemplate>> {
        self.templates
            .get_template(template_id, version)
            .await?
            .ok_or_else(|| WorkflowError::template_not_found(template_id, version))
    }

    pub(super) fn validator<'a>(&self, template: &'a FormTemplate) -> FormValidator<'a> {
        FormValidator::new(template, self.config.max_nesting_depth)
    }

    pub(super) async fn load_for_update(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        expected: Option<&InstanceVersion>,
    ) -> WorkflowResult<VersionedInstance> {
        self.instances
            .load_for_update(ctx.tenant_id(), instance_id, expected)
            .await
    }

    /// Evaluate the gate of the instance's current step for the context's actor.
    ///
    /// Shared by `advance` and `can_approve`.
    pub(super) async fn approval_check(
        &self,
        ctx: &RequestContext,
        instance: &FormInstance,
    ) -> WorkflowResult<ApprovalCheck> {
        if instance.tenant_id != ctx.tenant_id() || instance.is_deleted() {
            return Err(WorkflowError::instance_not_found(ctx.tenant_id(), &instance.id));
        }
        if !instance.status.awaits_decision() {
            return Err(WorkflowError::invalid_transition("advance", instance.status));
        }
        let Some(step_name) = instance.current_workflow_step.as_deref() else {
            return Err(WorkflowError::invalid_transition("advance", instance.status));
        };

        let template = self
            .load_template(&instance.template_id, Some(instance.template_version))
            .await?;
        let step = template.workflow_step(step_name).cloned().ok_or_else(|| {
            WorkflowError::invalid_template(
                &template.id,
                format!("workflow step '{step_name}' no longer exists"),
            )
        })?;

        let decision = evaluate_gate(&self.resolver, ctx.tenant_id(), ctx.actor_id(), &step).await;
        Ok(ApprovalCheck {
            template,
            step,
            decision,
        })
    }

    /// Move the instance onto `step`, starting its SLA clock and recording
    /// a configuration warning if nobody can ever pass it.
    pub(super) async fn enter_step(
        &self,
        ctx: &RequestContext,
        instance: &mut FormInstance,
        step: &WorkflowStepConfig,
        now: DateTime<Utc>,
    ) {
        instance.current_workflow_step = Some(step.step_name.clone());
        instance.step_entered_at = Some(now);
        instance.step_due_at = None;
        if let Some(hours) = step.sla_hours {
            instance.step_due_at = sla_deadline(now, hours);
            if instance.step_due_at.is_none() {
                let reason = format!("SLA of {hours} hours cannot be scheduled");
                error!(
                    "Form instance '{}' entered step '{}' ({}): {}",
                    instance.id, step.step_name, ctx, reason
                );
                let already_warned = instance
                    .configuration_warnings
                    .iter()
                    .any(|w| w.step_name == step.step_name && w.message == reason);
                if !already_warned {
                    instance
                        .configuration_warnings
                        .push(ConfigurationWarning::new(&step.step_name, reason));
                }
            }
        }

        match unreachable_reason(&self.resolver, ctx.tenant_id(), step).await {
            Ok(Some(reason)) => {
                error!(
                    "Form instance '{}' entered unreachable step ({}): {}",
                    instance.id, ctx, reason
                );
                if !instance.has_warning_for(&step.step_name) {
                    instance
                        .configuration_warnings
                        .push(ConfigurationWarning::new(&step.step_name, reason));
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Could not check step '{}' of form instance '{}' ({}): {}",
                step.step_name, instance.id, ctx, e
            ),
        }
    }

    pub(super) fn leave_workflow(instance: &mut FormInstance) {
        instance.current_workflow_step = None;
        instance.step_entered_at = None;
        instance.step_due_at = None;
    }

    /// Conditionally save the transition, then notify.
    pub(super) async fn commit(
        &self,
        ctx: &RequestContext,
        previous: &VersionedInstance,
        updated: &FormInstance,
        events: &[TransitionEventType],
    ) -> WorkflowResult<VersionedInstance> {
        let saved = self.instances.save_conditional(previous, updated).await?;

        let occurred_at = Utc::now();
        let events = events
            .iter()
            .map(|event_type| TransitionEvent {
                event_type: *event_type,
                instance: saved.instance.clone(),
                actor_id: ctx.actor_id().to_string(),
                tenant_id: ctx.tenant_id().to_string(),
                request_id: ctx.request_id.clone(),
                occurred_at,
            })
            .collect();
        dispatch(&self.notifiers, self.config.notification_dispatch, events).await;

        Ok(saved)
    }
}

/// Deadline `hours` after `now`, or `None` when it falls outside the
/// representable calendar.
pub(crate) fn sla_deadline(now: DateTime<Utc>, hours: u32) -> Option<DateTime<Utc>> {
    TimeDelta::try_hours(i64::from(hours)).and_then(|delta| now.checked_add_signed(delta))
}
