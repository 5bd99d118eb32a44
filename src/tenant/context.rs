//! Explicit request context for permission and workflow calls.
//!
//! There is no ambient "current tenant". Every engine operation receives a
//! [`RequestContext`] naming the tenant to evaluate against and the acting
//! user, and every log line the engine emits carries its request id.

use std::fmt;
use uuid::Uuid;

/// Request context for workflow operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Unique identifier for this request, used for log correlation
    pub request_id: String,
    /// Tenant the operation is scoped to
    pub tenant_id: String,
    /// User performing the operation
    pub actor_id: String,
}

impl RequestContext {
    /// Create a context with a generated request id.
    pub fn new(tenant_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            actor_id: actor_id.into(),
        }
    }

    /// Create a context with a caller-supplied request id.
    pub fn with_request_id(
        request_id: impl Into<String>,
        tenant_id: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            tenant_id: tenant_id.into(),
            actor_id: actor_id.into(),
        }
    }

    /// Same tenant and request, different actor.
    pub fn as_actor(&self, actor_id: impl Into<String>) -> Self {
        Self {
            request_id: self.request_id.clone(),
            tenant_id: self.tenant_id.clone(),
            actor_id: actor_id.into(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tenant '{}', actor '{}' (request: '{}')",
            self.tenant_id, self.actor_id, self.request_id
        )
    }
}
