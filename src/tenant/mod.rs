//! Tenant membership, roles and the explicit request context.
//!
//! All data and permissions are scoped to a tenant. This module holds the
//! types describing who belongs to which tenant in which role, and the
//! [`DirectoryStore`] seam through which the permission resolver reads them.

pub mod context;
pub mod directory;
pub mod membership;

pub use context::RequestContext;
pub use directory::{DirectoryStore, InMemoryDirectory, RoleAdmin};
pub use membership::{Membership, MembershipStatus, Role, RoleScope};
