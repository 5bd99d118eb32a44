//! Tenant-scoped permission resolution.
//!
//! [`PermissionResolver`] answers "may this user do this in this tenant" from
//! the membership and role data of a [`DirectoryStore`]. Resolution never
//! returns an error: a missing membership, an inactive membership, a dangling
//! role or a directory failure all resolve to "not allowed" and are logged.
//!
//! Role permission sets are cached by role id. Cache fills and role mutations
//! both take the cache write lock, so a mutation made through the resolver is
//! visible to every check that starts after the mutating call returns.
//! Mutations applied to the directory directly are caught through
//! [`DirectoryStore::role_revision`]: the cache is emptied as soon as the
//! revision moves.

use super::matcher::{EffectivePermissions, PermissionQuery};
use crate::tenant::{DirectoryStore, Membership, Role, RoleAdmin};
use log::{debug, error, trace, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A user resolved against one tenant.
#[derive(Debug, Clone)]
pub struct ResolvedActor {
    pub membership: Membership,
    /// `None` when the membership references a missing or foreign role
    pub role: Option<Arc<Role>>,
    pub effective: EffectivePermissions,
}

impl ResolvedActor {
    pub fn role_name(&self) -> Option<&str> {
        self.role.as_deref().map(|role| role.name.as_str())
    }

    pub fn allows(&self, query: &PermissionQuery) -> bool {
        self.effective.allows_query(query)
    }
}

/// Cached roles, valid for one directory role revision.
#[derive(Debug, Default)]
struct RoleCache {
    revision: Option<u64>,
    roles: HashMap<String, Arc<Role>>,
}

impl RoleCache {
    /// Empty the cache if the directory moved past the cached revision.
    /// Returns whether entries may be read or written for `revision`.
    fn sync(&mut self, revision: Option<u64>) -> bool {
        if revision > self.revision {
            if !self.roles.is_empty() {
                debug!(
                    "Directory role revision moved to {:?}; dropping {} cached roles",
                    revision,
                    self.roles.len()
                );
            }
            self.roles.clear();
            self.revision = revision;
        }
        revision == self.revision
    }
}

/// Permission resolver over a directory, with a synchronously invalidated
/// role cache.
#[derive(Debug)]
pub struct PermissionResolver<D> {
    directory: Arc<D>,
    role_cache: Arc<RwLock<RoleCache>>,
    cache_enabled: bool,
}

impl<D> Clone for PermissionResolver<D> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            role_cache: Arc::clone(&self.role_cache),
            cache_enabled: self.cache_enabled,
        }
    }
}

impl<D: DirectoryStore> PermissionResolver<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self {
            directory,
            role_cache: Arc::new(RwLock::new(RoleCache::default())),
            cache_enabled: true,
        }
    }

    /// Resolver that reads roles from the directory on every check.
    pub fn without_cache(directory: Arc<D>) -> Self {
        Self {
            cache_enabled: false,
            ..Self::new(directory)
        }
    }

    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Whether `user_id` holds the permission (or any of the listed
    /// permissions) in `tenant_id`.
    pub async fn has_permission(
        &self,
        user_id: &str,
        tenant_id: &str,
        query: impl Into<PermissionQuery>,
    ) -> bool {
        let query = query.into();
        let allowed = match self.effective_permissions(user_id, tenant_id).await {
            Some(effective) => effective.allows_query(&query),
            None => false,
        };
        trace!(
            "Permission check {:?} for user '{}' in tenant '{}': {}",
            query.permissions(),
            user_id,
            tenant_id,
            allowed
        );
        allowed
    }

    /// Effective permissions of an active membership; `None` fails closed.
    pub async fn effective_permissions(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Option<EffectivePermissions> {
        self.resolve_actor(user_id, tenant_id)
            .await
            .map(|actor| actor.effective)
    }

    /// Resolve the user's active membership, role and effective permissions.
    pub async fn resolve_actor(&self, user_id: &str, tenant_id: &str) -> Option<ResolvedActor> {
        let membership = match self.directory.get_membership(user_id, tenant_id).await {
            Ok(Some(membership)) => membership,
            Ok(None) => {
                debug!("User '{}' has no membership in tenant '{}'", user_id, tenant_id);
                return None;
            }
            Err(e) => {
                error!(
                    "Membership lookup failed for user '{}' in tenant '{}': {}",
                    user_id, tenant_id, e
                );
                return None;
            }
        };

        if !membership.is_active() {
            debug!("Membership of user '{}' in tenant '{}' is inactive", user_id, tenant_id);
            return None;
        }

        let role = match self.role(&membership.role_id).await {
            Ok(Some(role)) if role.is_visible_to(tenant_id) => Some(role),
            Ok(Some(role)) => {
                warn!(
                    "Role '{}' of user '{}' is scoped to another tenant than '{}'; ignoring it",
                    role.id, user_id, tenant_id
                );
                None
            }
            Ok(None) => {
                warn!(
                    "Membership of user '{}' in tenant '{}' references missing role '{}'",
                    user_id, tenant_id, membership.role_id
                );
                None
            }
            Err(e) => {
                error!(
                    "Role lookup failed for '{}' (user '{}', tenant '{}'): {}",
                    membership.role_id, user_id, tenant_id, e
                );
                return None;
            }
        };

        let no_permissions = BTreeSet::new();
        let role_permissions = role
            .as_deref()
            .map(|role| &role.permissions)
            .unwrap_or(&no_permissions);
        let effective = EffectivePermissions::compose(
            role_permissions,
            &membership.granted_permissions,
            &membership.denied_permissions,
        );

        Some(ResolvedActor {
            membership,
            role,
            effective,
        })
    }

    /// Role usable in `tenant_id` with the given name.
    pub async fn role_by_name(&self, tenant_id: &str, name: &str) -> Result<Option<Role>, D::Error> {
        self.directory.find_role_by_name(tenant_id, name).await
    }

    /// Drop one role from the cache.
    pub async fn invalidate_role(&self, role_id: &str) {
        let mut cache = self.role_cache.write().await;
        if cache.roles.remove(role_id).is_some() {
            debug!("Invalidated cached role '{}'", role_id);
        }
    }

    pub async fn invalidate_all(&self) {
        let mut cache = self.role_cache.write().await;
        let count = cache.roles.len();
        cache.roles.clear();
        debug!("Invalidated {} cached roles", count);
    }

    /// Number of roles cached for the directory's current role revision.
    pub async fn cached_role_count(&self) -> usize {
        let revision = self.directory.role_revision();
        let cache = self.role_cache.read().await;
        if revision == cache.revision {
            cache.roles.len()
        } else {
            0
        }
    }

    async fn role(&self, role_id: &str) -> Result<Option<Arc<Role>>, D::Error> {
        if !self.cache_enabled {
            return Ok(self.directory.get_role(role_id).await?.map(Arc::new));
        }

        // Read the revision before the role so a change racing this lookup
        // leaves the filled entry tagged with an outdated revision.
        let revision = self.directory.role_revision();
        {
            let cache = self.role_cache.read().await;
            if cache.revision == revision {
                if let Some(role) = cache.roles.get(role_id) {
                    return Ok(Some(Arc::clone(role)));
                }
            }
        }

        // Fill under the write lock so a concurrent mutation cannot slip a
        // stale role into the cache after invalidating it.
        let mut cache = self.role_cache.write().await;
        let current = cache.sync(revision);
        if current {
            if let Some(role) = cache.roles.get(role_id) {
                return Ok(Some(Arc::clone(role)));
            }
        }
        let role = self.directory.get_role(role_id).await?.map(Arc::new);
        if let (true, Some(role)) = (current, &role) {
            cache.roles.insert(role_id.to_string(), Arc::clone(role));
        }
        Ok(role)
    }
}

impl<D: RoleAdmin> PermissionResolver<D> {
    /// Insert or replace a role; the cached copy is dropped before returning.
    pub async fn upsert_role(&self, role: Role) -> Result<(), D::Error> {
        let mut cache = self.role_cache.write().await;
        let role_id = role.id.clone();
        self.directory.put_role(role).await?;
        cache.roles.remove(&role_id);
        debug!("Upserted role '{}'", role_id);
        Ok(())
    }

    /// Replace a role's permission set; `false` if the role does not exist.
    pub async fn set_role_permissions(
        &self,
        role_id: &str,
        permissions: BTreeSet<String>,
    ) -> Result<bool, D::Error> {
        let mut cache = self.role_cache.write().await;
        let updated = self
            .directory
            .replace_role_permissions(role_id, permissions)
            .await?;
        cache.roles.remove(role_id);
        debug!("Replaced permissions of role '{}': {}", role_id, updated);
        Ok(updated)
    }

    pub async fn remove_role(&self, role_id: &str) -> Result<Option<Role>, D::Error> {
        let mut cache = self.role_cache.write().await;
        let removed = self.directory.delete_role(role_id).await?;
        cache.roles.remove(role_id);
        debug!("Removed role '{}'", role_id);
        Ok(removed)
    }
}
