//! Approval gate evaluation for workflow steps.
//!
//! Both `advance` and `can_approve` go through [`evaluate_gate`], so the
//! answer to "may this actor approve" cannot drift between the two.

use crate::permissions::PermissionResolver;
use crate::template::WorkflowStepConfig;
use crate::tenant::DirectoryStore;
use log::{debug, error};

/// Outcome of evaluating a step's gate for one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied(String),
    /// No actor can ever pass this gate in this tenant
    Unreachable(String),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Why a step can never be passed in `tenant_id`, if it cannot.
///
/// A directory failure is not proof of a configuration error, so it yields
/// `Ok(None)` after logging; the gate itself then fails closed.
pub async fn unreachable_reason<D: DirectoryStore>(
    resolver: &PermissionResolver<D>,
    tenant_id: &str,
    step: &WorkflowStepConfig,
) -> Result<Option<String>, D::Error> {
    match &step.approver_role {
        Some(role_name) => {
            let role = resolver.role_by_name(tenant_id, role_name).await?;
            Ok(role.is_none().then(|| {
                format!(
                    "approver role '{}' of step '{}' does not exist in tenant '{}'",
                    role_name, step.step_name, tenant_id
                )
            }))
        }
        None if step.required_permissions.is_empty() => Ok(Some(format!(
            "step '{}' declares neither an approver role nor required permissions",
            step.step_name
        ))),
        None => Ok(None),
    }
}

/// Evaluate whether `actor_id` passes the gate of `step` in `tenant_id`.
///
/// The actor passes when their role's name equals the step's approver role,
/// or when they hold every one of the step's required permissions.
pub async fn evaluate_gate<D: DirectoryStore>(
    resolver: &PermissionResolver<D>,
    tenant_id: &str,
    actor_id: &str,
    step: &WorkflowStepConfig,
) -> GateDecision {
    match unreachable_reason(resolver, tenant_id, step).await {
        Ok(Some(reason)) => {
            error!("Workflow configuration error: {}", reason);
            return GateDecision::Unreachable(reason);
        }
        Ok(None) => {}
        Err(e) => {
            error!(
                "Role lookup for step '{}' in tenant '{}' failed: {}",
                step.step_name, tenant_id, e
            );
            return GateDecision::Denied(format!(
                "approver role of step '{}' could not be resolved",
                step.step_name
            ));
        }
    }

    let Some(actor) = resolver.resolve_actor(actor_id, tenant_id).await else {
        return GateDecision::Denied(format!("no active membership in tenant '{tenant_id}'"));
    };

    if let (Some(required), Some(held)) = (&step.approver_role, actor.role_name()) {
        if required == held {
            debug!(
                "'{}' passes step '{}' by role '{}'",
                actor_id, step.step_name, held
            );
            return GateDecision::Allowed;
        }
    }

    if actor.effective.allows_all(&step.required_permissions) {
        debug!(
            "'{}' passes step '{}' by permissions {:?}",
            actor_id, step.step_name, step.required_permissions
        );
        return GateDecision::Allowed;
    }

    let mut requirements = Vec::new();
    if let Some(role) = &step.approver_role {
        requirements.push(format!("role '{role}'"));
    }
    if !step.required_permissions.is_empty() {
        requirements.push(format!(
            "permissions [{}]",
            step.required_permissions.join(", ")
        ));
    }
    GateDecision::Denied(format!(
        "step '{}' requires {}",
        step.step_name,
        requirements.join(" or ")
    ))
}
