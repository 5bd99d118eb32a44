//! Permission string matching and effective permission sets.
//!
//! Permissions are dot-separated strings such as `forms.approve`. Two
//! catch-all forms exist:
//!
//! * `*` covers every permission
//! * `ns.*` covers `ns` itself and everything below `ns.`
//!
//! The same coverage rule applies to denials, so denying `finance.*` removes
//! every finance permission even when a role grants `*`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Catch-all permission covering every namespace.
pub const WILDCARD: &str = "*";

const NAMESPACE_WILDCARD_SUFFIX: &str = ".*";

/// Whether the held permission `held` covers the `requested` permission.
pub fn covers(held: &str, requested: &str) -> bool {
    if held == requested || held == WILDCARD {
        return true;
    }
    match held.strip_suffix(NAMESPACE_WILDCARD_SUFFIX) {
        Some(namespace) if !namespace.is_empty() => {
            requested == namespace
                || requested
                    .strip_prefix(namespace)
                    .is_some_and(|rest| rest.starts_with('.'))
        }
        _ => false,
    }
}

/// A permission check: a single permission, or a list where any one suffices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionQuery {
    One(String),
    AnyOf(Vec<String>),
}

impl PermissionQuery {
    pub fn any_of<I, P>(permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self::AnyOf(permissions.into_iter().map(Into::into).collect())
    }

    pub fn permissions(&self) -> &[String] {
        match self {
            Self::One(permission) => std::slice::from_ref(permission),
            Self::AnyOf(permissions) => permissions,
        }
    }
}

impl From<&str> for PermissionQuery {
    fn from(permission: &str) -> Self {
        Self::One(permission.to_string())
    }
}

impl From<String> for PermissionQuery {
    fn from(permission: String) -> Self {
        Self::One(permission)
    }
}

impl From<&String> for PermissionQuery {
    fn from(permission: &String) -> Self {
        Self::One(permission.clone())
    }
}

impl From<Vec<String>> for PermissionQuery {
    fn from(permissions: Vec<String>) -> Self {
        Self::AnyOf(permissions)
    }
}

impl From<Vec<&str>> for PermissionQuery {
    fn from(permissions: Vec<&str>) -> Self {
        Self::any_of(permissions)
    }
}

impl From<&[&str]> for PermissionQuery {
    fn from(permissions: &[&str]) -> Self {
        Self::any_of(permissions.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for PermissionQuery {
    fn from(permissions: [&str; N]) -> Self {
        Self::any_of(permissions)
    }
}

/// The permission set of one membership: (role ∪ granted) − denied.
///
/// Subtraction is evaluated lazily so wildcard grants and wildcard denials
/// compose: a permission is allowed when some held entry covers it and no
/// denied entry does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissions {
    held: BTreeSet<String>,
    denied: BTreeSet<String>,
}

impl EffectivePermissions {
    pub fn compose<'a, R, G, D>(role: R, granted: G, denied: D) -> Self
    where
        R: IntoIterator<Item = &'a String>,
        G: IntoIterator<Item = &'a String>,
        D: IntoIterator<Item = &'a String>,
    {
        Self {
            held: role.into_iter().chain(granted).cloned().collect(),
            denied: denied.into_iter().cloned().collect(),
        }
    }

    /// Whether a single permission is in the effective set.
    pub fn allows(&self, permission: &str) -> bool {
        if self.denied.iter().any(|d| covers(d, permission)) {
            return false;
        }
        self.held.iter().any(|h| covers(h, permission))
    }

    /// Any-of evaluation. An empty query is never satisfied.
    pub fn allows_query(&self, query: &PermissionQuery) -> bool {
        query.permissions().iter().any(|p| self.allows(p))
    }

    /// All-of evaluation. An empty list is never satisfied.
    pub fn allows_all(&self, permissions: &[String]) -> bool {
        !permissions.is_empty() && permissions.iter().all(|p| self.allows(p))
    }

    /// Permissions held before denials are applied.
    pub fn held(&self) -> &BTreeSet<String> {
        &self.held
    }

    pub fn denied(&self) -> &BTreeSet<String> {
        &self.denied
    }

    /// Concrete (non-wildcard) held permissions that survive the denials.
    pub fn concrete(&self) -> BTreeSet<String> {
        self.held
            .iter()
            .filter(|p| *p != WILDCARD && !p.ends_with(NAMESPACE_WILDCARD_SUFFIX))
            .filter(|p| self.allows(p))
            .cloned()
            .collect()
    }
}
