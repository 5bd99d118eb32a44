//! Mutating workflow operations.
//!
//! Every transition follows load → check → conditional save. The save only
//! succeeds if the stored record is unchanged since the load, so two callers
//! racing on the same instance get exactly one success and one `StaleState`.

use super::engine::WorkflowEngine;
use super::gate::GateDecision;
use super::notify::TransitionEventType;
use crate::error::{WorkflowError, WorkflowResult};
use crate::instance::{
    Decision, FormInstance, HistoryDecision, HistoryEntry, InstanceStatus, InstanceVersion,
    VersionedInstance,
};
use crate::storage::{StorageError, StorageProvider};
use crate::template::TemplateStore;
use crate::tenant::{DirectoryStore, RequestContext};
use chrono::Utc;
use log::{error, info, trace};
use serde_json::Value;

/// Input to [`WorkflowEngine::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceRequest {
    pub decision: Decision,
    pub notes: Option<String>,
    /// Version the caller observed; a mismatch fails with `StaleState`
    pub expected_version: Option<InstanceVersion>,
}

impl AdvanceRequest {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            notes: None,
            expected_version: None,
        }
    }

    pub fn approve() -> Self {
        Self::new(Decision::Approve)
    }

    pub fn reject() -> Self {
        Self::new(Decision::Reject)
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn expecting(mut self, version: InstanceVersion) -> Self {
        self.expected_version = Some(version);
        self
    }
}

impl<D, T, S> WorkflowEngine<D, T, S>
where
    D: DirectoryStore,
    T: TemplateStore,
    S: StorageProvider,
    S::Error: Into<StorageError>,
{
    /// Create a draft owned by the acting user.
    ///
    /// Field rules are not applied yet; the data only has to be a JSON
    /// object within the nesting bound.
    pub async fn create_draft(
        &self,
        ctx: &RequestContext,
        template_id: &str,
        form_data: Value,
    ) -> WorkflowResult<VersionedInstance> {
        self.require_member(ctx).await?;

        let template = self.load_template(template_id, None).await?;
        if !template.is_visible_to(ctx.tenant_id()) {
            return Err(WorkflowError::template_not_found(template_id, None));
        }
        self.validator(&template)
            .validate_shape(&form_data)
            .map_err(|errors| WorkflowError::ValidationFailed { errors })?;

        let instance = FormInstance::new_draft(
            &template.id,
            template.version,
            ctx.actor_id(),
            ctx.tenant_id(),
            form_data,
        );
        let stored = self.instances.insert(&instance).await?;
        info!(
            "Created draft '{}' of template '{}' v{} for {}",
            instance.id, template.id, template.version, ctx
        );
        Ok(stored)
    }

    /// Replace the form data of a draft. Owner only.
    pub async fn update_draft(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        form_data: Value,
        expected_version: Option<&InstanceVersion>,
    ) -> WorkflowResult<VersionedInstance> {
        self.require_member(ctx).await?;
        let current = self.load_for_update(ctx, instance_id, expected_version).await?;
        let instance = &current.instance;

        if !instance.is_owned_by(ctx.actor_id()) {
            return Err(WorkflowError::permission_denied(
                ctx.actor_id(),
                "only the owner can edit a draft",
            ));
        }
        if instance.status != InstanceStatus::Draft {
            return Err(WorkflowError::invalid_transition("update", instance.status));
        }

        let template = self
            .load_template(&instance.template_id, Some(instance.template_version))
            .await?;
        self.validator(&template)
            .validate_shape(&form_data)
            .map_err(|errors| WorkflowError::ValidationFailed { errors })?;

        let mut updated = instance.clone();
        updated.form_data = form_data;
        updated.updated_at = Utc::now();

        let saved = self.commit(ctx, &current, &updated, &[]).await?;
        trace!("Updated draft '{}' for {}", instance_id, ctx);
        Ok(saved)
    }

    /// Validate and submit a draft. Owner only.
    ///
    /// The instance enters the first workflow step, or lands directly on the
    /// configured terminal status when the template has no workflow steps.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        expected_version: Option<&InstanceVersion>,
    ) -> WorkflowResult<VersionedInstance> {
        self.require_member(ctx).await?;
        let current = self.load_for_update(ctx, instance_id, expected_version).await?;
        let instance = &current.instance;

        if !instance.is_owned_by(ctx.actor_id()) {
            return Err(WorkflowError::permission_denied(
                ctx.actor_id(),
                "only the owner can submit a form",
            ));
        }
        if instance.status != InstanceStatus::Draft {
            return Err(WorkflowError::invalid_transition("submit", instance.status));
        }

        let template = self
            .load_template(&instance.template_id, Some(instance.template_version))
            .await?;
        if let Err(errors) = self.validator(&template).validate(&instance.form_data) {
            info!(
                "Submission of '{}' rejected with {} field error(s) for {}",
                instance_id,
                errors.len(),
                ctx
            );
            return Err(WorkflowError::ValidationFailed { errors });
        }

        let now = Utc::now();
        let mut updated = instance.clone();
        updated.submitted_at = Some(now);
        updated.updated_at = now;
        updated.workflow_history.push(HistoryEntry::new(
            None,
            ctx.actor_id(),
            HistoryDecision::Submit,
            None,
        ));

        let mut events = vec![TransitionEventType::Submitted];
        match template.first_step() {
            Some(step) => {
                updated.status = InstanceStatus::Submitted;
                self.enter_step(ctx, &mut updated, step, now).await;
            }
            None => {
                updated.status = self.config.empty_workflow_outcome.status();
                Self::leave_workflow(&mut updated);
                events.extend(TransitionEventType::for_status(updated.status));
            }
        }

        let saved = self.commit(ctx, &current, &updated, &events).await?;
        info!(
            "Submitted form instance '{}' ({} -> {}) for {}",
            instance_id, InstanceStatus::Draft, saved.instance.status, ctx
        );
        Ok(saved)
    }

    /// Record an approver decision on the current workflow step.
    ///
    /// `approve` moves to the next step or, on the last step, to `approved`;
    /// `reject` ends the workflow as `rejected`. The actor must pass the
    /// current step's gate; a refused call changes nothing.
    pub async fn advance(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        request: AdvanceRequest,
    ) -> WorkflowResult<VersionedInstance> {
        let current = self
            .load_for_update(ctx, instance_id, request.expected_version.as_ref())
            .await?;
        let check = self.approval_check(ctx, &current.instance).await?;
        let step_name = check.step.step_name.as_str();

        match check.decision {
            GateDecision::Allowed => {}
            GateDecision::Denied(reason) => {
                info!(
                    "Advance of '{}' at step '{}' denied for {}: {}",
                    instance_id, step_name, ctx, reason
                );
                return Err(WorkflowError::permission_denied(ctx.actor_id(), reason));
            }
            GateDecision::Unreachable(reason) => {
                error!(
                    "Form instance '{}' is held at unreachable step '{}' ({}): {}",
                    instance_id, step_name, ctx, reason
                );
                return Err(WorkflowError::permission_denied(
                    ctx.actor_id(),
                    format!("step '{step_name}' cannot be approved: {reason}"),
                ));
            }
        }

        let now = Utc::now();
        let mut updated = current.instance.clone();
        updated.updated_at = now;
        updated.workflow_history.push(HistoryEntry::new(
            Some(step_name),
            ctx.actor_id(),
            request.decision.into(),
            request.notes,
        ));

        let event = match (request.decision, check.template.next_step_after(step_name)) {
            (Decision::Approve, Some(next)) => {
                updated.status = InstanceStatus::InReview;
                self.enter_step(ctx, &mut updated, next, now).await;
                TransitionEventType::StepAdvanced
            }
            (Decision::Approve, None) => {
                updated.status = InstanceStatus::Approved;
                Self::leave_workflow(&mut updated);
                TransitionEventType::Approved
            }
            (Decision::Reject, _) => {
                updated.status = InstanceStatus::Rejected;
                Self::leave_workflow(&mut updated);
                TransitionEventType::Rejected
            }
        };

        let saved = self.commit(ctx, &current, &updated, &[event]).await?;
        info!(
            "Form instance '{}' {} at step '{}' ({} -> {}, now at {}) for {}",
            instance_id,
            HistoryDecision::from(request.decision),
            step_name,
            current.instance.status,
            saved.instance.status,
            saved
                .instance
                .current_workflow_step
                .as_deref()
                .unwrap_or("-"),
            ctx
        );
        Ok(saved)
    }

    /// Move an approved instance to `completed`.
    pub async fn complete(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        notes: Option<String>,
        expected_version: Option<&InstanceVersion>,
    ) -> WorkflowResult<VersionedInstance> {
        let current = self.load_for_update(ctx, instance_id, expected_version).await?;
        if current.instance.status != InstanceStatus::Approved {
            return Err(WorkflowError::invalid_transition(
                "complete",
                current.instance.status,
            ));
        }

        let permission = self.config.completion_permission.as_str();
        if !self
            .resolver
            .has_permission(ctx.actor_id(), ctx.tenant_id(), permission)
            .await
        {
            return Err(WorkflowError::permission_denied(
                ctx.actor_id(),
                format!("completing a form requires '{permission}'"),
            ));
        }

        let now = Utc::now();
        let mut updated = current.instance.clone();
        updated.status = InstanceStatus::Completed;
        updated.updated_at = now;
        updated.workflow_history.push(HistoryEntry::new(
            None,
            ctx.actor_id(),
            HistoryDecision::Complete,
            notes,
        ));

        let saved = self
            .commit(ctx, &current, &updated, &[TransitionEventType::Completed])
            .await?;
        info!("Completed form instance '{}' for {}", instance_id, ctx);
        Ok(saved)
    }

    /// Soft-delete an instance.
    ///
    /// The owner may delete their own draft; holders of the delete
    /// permission may delete in any state. History is left untouched.
    pub async fn soft_delete(
        &self,
        ctx: &RequestContext,
        instance_id: &str,
        expected_version: Option<&InstanceVersion>,
    ) -> WorkflowResult<VersionedInstance> {
        let actor = self.require_member(ctx).await?;
        let current = self.load_for_update(ctx, instance_id, expected_version).await?;
        let instance = &current.instance;

        let owns_draft =
            instance.is_owned_by(ctx.actor_id()) && instance.status == InstanceStatus::Draft;
        let permission = self.config.delete_permission.as_str();
        if !owns_draft && !actor.effective.allows(permission) {
            return Err(WorkflowError::permission_denied(
                ctx.actor_id(),
                format!("deleting this form requires ownership of a draft or '{permission}'"),
            ));
        }

        let now = Utc::now();
        let mut updated = instance.clone();
        updated.deleted_at = Some(now);
        updated.updated_at = now;

        let saved = self
            .commit(ctx, &current, &updated, &[TransitionEventType::Deleted])
            .await?;
        info!(
            "Soft-deleted form instance '{}' (status {}) for {}",
            instance_id, instance.status, ctx
        );
        Ok(saved)
    }
}
