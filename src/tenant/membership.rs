//! Membership and role types.
//!
//! A [`Membership`] binds one user to one tenant with a role and per-user
//! permission adjustments. A [`Role`] is a named bundle of permission strings,
//! either global or owned by a single tenant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Membership status within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    Active,
    Inactive,
}

/// A user's role and status binding within one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: String,
    pub tenant_id: String,
    pub role_id: String,
    /// Extra permissions granted on top of the role
    #[serde(default)]
    pub granted_permissions: BTreeSet<String>,
    /// Permissions removed from the effective set; always wins
    #[serde(default)]
    pub denied_permissions: BTreeSet<String>,
    #[serde(default)]
    pub status: MembershipStatus,
    /// Default tenant hint for the surrounding layer
    #[serde(default)]
    pub is_current: bool,
}

impl Membership {
    /// Create an active membership with no permission adjustments.
    pub fn new(
        user_id: impl Into<String>,
        tenant_id: impl Into<String>,
        role_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            role_id: role_id.into(),
            granted_permissions: BTreeSet::new(),
            denied_permissions: BTreeSet::new(),
            status: MembershipStatus::Active,
            is_current: false,
        }
    }

    pub fn with_granted(mut self, permission: impl Into<String>) -> Self {
        self.granted_permissions.insert(permission.into());
        self
    }

    pub fn with_denied(mut self, permission: impl Into<String>) -> Self {
        self.denied_permissions.insert(permission.into());
        self
    }

    pub fn with_status(mut self, status: MembershipStatus) -> Self {
        self.status = status;
        self
    }

    pub fn as_current(mut self) -> Self {
        self.is_current = true;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

/// Where a role is defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "tenant_id")]
pub enum RoleScope {
    /// Available to every tenant
    Global,
    /// Owned by one tenant
    Tenant(String),
}

/// A named bundle of permission strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub scope: RoleScope,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Role {
    pub fn global(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scope: RoleScope::Global,
            permissions: BTreeSet::new(),
        }
    }

    pub fn for_tenant(
        id: impl Into<String>,
        name: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scope: RoleScope::Tenant(tenant_id.into()),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Whether members of `tenant_id` may hold this role.
    pub fn is_visible_to(&self, tenant_id: &str) -> bool {
        match &self.scope {
            RoleScope::Global => true,
            RoleScope::Tenant(owner) => owner == tenant_id,
        }
    }
}
