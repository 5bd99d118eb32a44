//! Read-only workflow queries.

use super::engine::WorkflowEngine;
use crate::error::{WorkflowError, WorkflowResult};
use crate::instance::{FormInstance, VersionedInstance};
use crate::storage::{StorageError, StorageProvider};
use crate::template::TemplateStore;
use crate::tenant::{DirectoryStore, RequestContext};
use chrono::{DateTime, Utc};
use log::debug;

impl<D, T, S> WorkflowEngine<D, T, S>
where
    D: DirectoryStore,
    T: TemplateStore,
    S: StorageProvider,
    S::Error: Into<StorageError>,
{
    /// Tenant-scoped read of a live instance.
    pub async fn get(&self, ctx: &RequestContext, instance_id: &str) -> WorkflowResult<VersionedInstance> {
        self.require_member(ctx).await?;
        self.instances
            .load(ctx.tenant_id(), instance_id)
            .await?
            .filter(|versioned| !versioned.instance.is_deleted())
            .ok_or_else(|| WorkflowError::instance_not_found(ctx.tenant_id(), instance_id))
    }

    /// Whether the context's actor could record a decision on `instance` now.
    ///
    /// Evaluates exactly what `advance` evaluates before it writes anything.
    pub async fn can_approve(&self, ctx: &RequestContext, instance: &FormInstance) -> bool {
        match self.approval_check(ctx, instance).await {
            Ok(check) => check.decision.is_allowed(),
            Err(e) => {
                debug!(
                    "can_approve is false for instance '{}' ({}): {}",
                    instance.id, ctx, e
                );
                false
            }
        }
    }

    /// Instances of the tenant awaiting a decision the actor can make.
    pub async fn pending_approvals(&self, ctx: &RequestContext) -> WorkflowResult<Vec<VersionedInstance>> {
        self.require_member(ctx).await?;
        let mut pending = Vec::new();
        for versioned in self.instances.list_for_tenant(ctx.tenant_id()).await? {
            if versioned.instance.status.awaits_decision()
                && self.can_approve(ctx, &versioned.instance).await
            {
                pending.push(versioned);
            }
        }
        Ok(pending)
    }

    /// Instances whose current step's SLA elapsed before `now`.
    pub async fn overdue_instances(
        &self,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Vec<VersionedInstance>> {
        self.require_member(ctx).await?;
        let overdue: Vec<_> = self
            .instances
            .list_for_tenant(ctx.tenant_id())
            .await?
            .into_iter()
            .filter(|versioned| versioned.instance.is_overdue(now))
            .collect();
        debug!("{} overdue form instance(s) for {}", overdue.len(), ctx);
        Ok(overdue)
    }
}
