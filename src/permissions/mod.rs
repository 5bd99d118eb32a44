//! Role and permission resolution scoped to a tenant.

pub mod matcher;
pub mod resolver;

pub use matcher::{EffectivePermissions, PermissionQuery, WILDCARD, covers};
pub use resolver::{PermissionResolver, ResolvedActor};
