//! Identity/tenant directory for membership and role lookups.
//!
//! The permission resolver reads memberships and roles through the
//! [`DirectoryStore`] trait; the surrounding application decides where they
//! live. [`InMemoryDirectory`] is the bundled implementation for tests,
//! development and embedding.
//!
//! # Security Considerations
//!
//! * A lookup error is never treated as "allowed": the resolver fails closed
//! * Role lookup by name must respect tenant scope, or one tenant's role
//!   could gate another tenant's workflow

use crate::storage::StorageError;
use crate::tenant::membership::{Membership, MembershipStatus, Role, RoleScope};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Trait for reading memberships and roles.
///
/// # Example Implementation
///
/// ```rust,no_run
/// use tenant_workflow::tenant::{DirectoryStore, Membership, Role};
/// use std::collections::HashMap;
///
/// struct FixedDirectory {
///     memberships: HashMap<(String, String), Membership>,
///     roles: HashMap<String, Role>,
/// }
///
/// impl DirectoryStore for FixedDirectory {
///     type Error = std::io::Error;
///
///     async fn get_membership(&self, user_id: &str, tenant_id: &str) -> Result<Option<Membership>, Self::Error> {
///         Ok(self.memberships.get(&(user_id.to_string(), tenant_id.to_string())).cloned())
///     }
///
///     async fn get_role(&self, role_id: &str) -> Result<Option<Role>, Self::Error> {
///         Ok(self.roles.get(role_id).cloned())
///     }
///
///     async fn find_role_by_name(&self, tenant_id: &str, name: &str) -> Result<Option<Role>, Self::Error> {
///         Ok(self.roles.values().find(|r| r.name == name && r.is_visible_to(tenant_id)).cloned())
///     }
///
///     async fn list_memberships(&self, user_id: &str) -> Result<Vec<Membership>, Self::Error> {
///         Ok(self.memberships.values().filter(|m| m.user_id == user_id).cloned().collect())
///     }
/// }
/// ```
pub trait DirectoryStore: Send + Sync {
    /// Error type for directory operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// The membership binding `user_id` to `tenant_id`, if any.
    ///
    /// Inactive memberships are returned as well; callers check the status.
    fn get_membership(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> impl Future<Output = Result<Option<Membership>, Self::Error>> + Send;

    fn get_role(
        &self,
        role_id: &str,
    ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send;

    /// Find a role usable in `tenant_id` by its name.
    ///
    /// A tenant-scoped role shadows a global role with the same name.
    fn find_role_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send;

    /// All memberships of a user across tenants.
    fn list_memberships(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Membership>, Self::Error>> + Send;

    /// Permissions attached to a role; `None` if the role does not exist.
    fn get_role_permissions(
        &self,
        role_id: &str,
    ) -> impl Future<Output = Result<Option<BTreeSet<String>>, Self::Error>> + Send
    where
        Self: Sync,
    {
        async move { Ok(self.get_role(role_id).await?.map(|role| role.permissions)) }
    }

    /// Counter that changes whenever a role is added, changed or removed.
    ///
    /// Resolvers drop their cached roles when it moves. Stores that return
    /// `None` must route role changes through [`RoleAdmin`] or invalidate the
    /// resolver themselves.
    fn role_revision(&self) -> Option<u64> {
        None
    }
}

/// Directories that allow role administration.
///
/// The permission resolver routes role mutations through this trait so it can
/// invalidate its cache in the same call.
pub trait RoleAdmin: DirectoryStore {
    /// Insert or replace a role.
    fn put_role(&self, role: Role) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Replace a role's permissions; `false` if the role does not exist.
    fn replace_role_permissions(
        &self,
        role_id: &str,
        permissions: BTreeSet<String>,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    fn delete_role(
        &self,
        role_id: &str,
    ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send;
}

#[derive(Debug, Default)]
struct DirectoryState {
    // (user_id, tenant_id) -> membership; the key enforces one membership per pair
    memberships: HashMap<(String, String), Membership>,
    roles: HashMap<String, Role>,
}

/// In-memory directory of roles and memberships.
///
/// Every role mutation bumps [`DirectoryStore::role_revision`] before it
/// returns, so resolvers never serve a role that was changed here.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
    role_revision: Arc<AtomicU64>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    // Called with the state write lock held, after the change is applied
    fn bump_role_revision(&self) {
        self.role_revision.fetch_add(1, Ordering::Release);
    }

    /// Insert or replace a role.
    pub async fn add_role(&self, role: Role) {
        let mut state = self.state.write().await;
        state.roles.insert(role.id.clone(), role);
        self.bump_role_revision();
    }

    /// Remove a role. Memberships referencing it keep no role permissions.
    pub async fn remove_role(&self, role_id: &str) -> Option<Role> {
        let mut state = self.state.write().await;
        let removed = state.roles.remove(role_id);
        if removed.is_some() {
            self.bump_role_revision();
        }
        removed
    }

    /// Replace the permission set of an existing role.
    ///
    /// Returns `false` if the role does not exist.
    pub async fn set_role_permissions(&self, role_id: &str, permissions: BTreeSet<String>) -> bool {
        let mut state = self.state.write().await;
        match state.roles.get_mut(role_id) {
            Some(role) => {
                role.permissions = permissions;
                self.bump_role_revision();
                true
            }
            None => false,
        }
    }

    /// Insert or replace the membership for its (user, tenant) pair.
    ///
    /// Marking a membership current clears the flag on the user's other
    /// memberships.
    pub async fn upsert_membership(&self, membership: Membership) {
        let mut state = self.state.write().await;
        if membership.is_current {
            clear_current_flag(&mut state, &membership.user_id);
        }
        let key = (membership.user_id.clone(), membership.tenant_id.clone());
        state.memberships.insert(key, membership);
    }

    pub async fn remove_membership(&self, user_id: &str, tenant_id: &str) -> Option<Membership> {
        let mut state = self.state.write().await;
        state
            .memberships
            .remove(&(user_id.to_string(), tenant_id.to_string()))
    }

    /// Returns `false` if no such membership exists.
    pub async fn set_membership_status(
        &self,
        user_id: &str,
        tenant_id: &str,
        status: MembershipStatus,
    ) -> bool {
        self.update_membership(user_id, tenant_id, |m| m.status = status)
            .await
    }

    /// Grant an extra permission to a membership.
    pub async fn grant_permission(&self, user_id: &str, tenant_id: &str, permission: &str) -> bool {
        self.update_membership(user_id, tenant_id, |m| {
            m.granted_permissions.insert(permission.to_string());
        })
        .await
    }

    /// Deny a permission for a membership. Denials override every grant.
    pub async fn deny_permission(&self, user_id: &str, tenant_id: &str, permission: &str) -> bool {
        self.update_membership(user_id, tenant_id, |m| {
            m.denied_permissions.insert(permission.to_string());
        })
        .await
    }

    /// Mark `tenant_id` as the user's current tenant.
    pub async fn set_current_tenant(&self, user_id: &str, tenant_id: &str) -> bool {
        let mut state = self.state.write().await;
        let key = (user_id.to_string(), tenant_id.to_string());
        if !state.memberships.contains_key(&key) {
            return false;
        }
        clear_current_flag(&mut state, user_id);
        if let Some(membership) = state.memberships.get_mut(&key) {
            membership.is_current = true;
        }
        true
    }

    /// The user's membership flagged as current, if any.
    pub async fn current_membership(&self, user_id: &str) -> Option<Membership> {
        let state = self.state.read().await;
        state
            .memberships
            .values()
            .find(|m| m.user_id == user_id && m.is_current)
            .cloned()
    }

    pub async fn role_count(&self) -> usize {
        self.state.read().await.roles.len()
    }

    pub async fn membership_count(&self) -> usize {
        self.state.read().await.memberships.len()
    }

    async fn update_membership<F>(&self, user_id: &str, tenant_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut Membership),
    {
        let mut state = self.state.write().await;
        match state
            .memberships
            .get_mut(&(user_id.to_string(), tenant_id.to_string()))
        {
            Some(membership) => {
                update(membership);
                true
            }
            None => false,
        }
    }
}

fn clear_current_flag(state: &mut DirectoryState, user_id: &str) {
    for membership in state.memberships.values_mut() {
        if membership.user_id == user_id {
            membership.is_current = false;
        }
    }
}

impl DirectoryStore for InMemoryDirectory {
    type Error = StorageError;

    async fn get_membership(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Option<Membership>, Self::Error> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .get(&(user_id.to_string(), tenant_id.to_string()))
            .cloned())
    }

    async fn get_role(&self, role_id: &str) -> Result<Option<Role>, Self::Error> {
        let state = self.state.read().await;
        Ok(state.roles.get(role_id).cloned())
    }

    async fn find_role_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<Role>, Self::Error> {
        let state = self.state.read().await;
        // Lowest id wins among same-scope duplicates
        let mut scoped: Option<&Role> = None;
        let mut global: Option<&Role> = None;
        for role in state.roles.values().filter(|r| r.name == name) {
            let slot = match &role.scope {
                RoleScope::Tenant(owner) if owner == tenant_id => &mut scoped,
                RoleScope::Global => &mut global,
                RoleScope::Tenant(_) => continue,
            };
            if (*slot).is_none_or(|current| role.id < current.id) {
                *slot = Some(role);
            }
        }
        Ok(scoped.or(global).cloned())
    }

    fn role_revision(&self) -> Option<u64> {
        Some(self.role_revision.load(Ordering::Acquire))
    }

    async fn list_memberships(&self, user_id: &str) -> Result<Vec<Membership>, Self::Error> {
        let state = self.state.read().await;
        let mut memberships: Vec<Membership> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        memberships.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(memberships)
    }
}

impl RoleAdmin for InMemoryDirectory {
    async fn put_role(&self, role: Role) -> Result<(), Self::Error> {
        self.add_role(role).await;
        Ok(())
    }

    async fn replace_role_permissions(
        &self,
        role_id: &str,
        permissions: BTreeSet<String>,
    ) -> Result<bool, Self::Error> {
        Ok(self.set_role_permissions(role_id, permissions).await)
    }

    async fn delete_role(&self, role_id: &str) -> Result<Option<Role>, Self::Error> {
        Ok(self.remove_role(role_id).await)
    }
}
