//! Tenant-keyed JSON persistence for workflow records.
//!
//! [`StorageProvider`] stores opaque JSON values under
//! `tenant_id/resource_type/resource_id` keys. Form instances, versions and
//! permissions are layered on top by [`instance`](crate::instance) and
//! [`workflow`](crate::workflow); nothing here inspects the stored documents.
//!
//! Conditional writes go through [`StorageProvider::compare_and_put`], which
//! swaps a record only when it still equals the snapshot the caller read.
//!
//! ```rust
//! use tenant_workflow::storage::{InMemoryStorage, PutOutcome, StorageKey, StorageProvider};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = InMemoryStorage::new();
//! let key = StorageKey::new("school-a", "FormInstance", "42");
//!
//! let original = storage.put(key.clone(), json!({"status": "draft"})).await?;
//!
//! // Only replaces the record if nobody changed it in the meantime
//! let outcome = storage
//!     .compare_and_put(key.clone(), &original, json!({"status": "submitted"}))
//!     .await?;
//! assert!(matches!(outcome, PutOutcome::Stored(_)));
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;


pub use errors::StorageError;
pub use in_memory::{InMemoryStorage, InMemoryStorageStats};

use serde_json::Value;
use std::fmt;
use std::future::Future;

/// A hierarchical key for identifying records in storage.
///
/// Records are organized as: `tenant_id` → `resource_type` → `resource_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    tenant_id: String,
    resource_type: String,
    resource_id: String,
}

impl StorageKey {
    pub fn new(
        tenant_id: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Create a prefix key for listing records of a type within a tenant.
    pub fn prefix(tenant_id: impl Into<String>, resource_type: impl Into<String>) -> StoragePrefix {
        StoragePrefix {
            tenant_id: tenant_id.into(),
            resource_type: resource_type.into(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.tenant_id, self.resource_type, self.resource_id
        )
    }
}

/// A prefix for querying records by tenant and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePrefix {
    tenant_id: String,
    resource_type: String,
}

impl StoragePrefix {
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }
}

impl fmt::Display for StoragePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.resource_type)
    }
}

/// Result of a [`StorageProvider::compare_and_put`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum PutOutcome {
    /// The record matched the expected snapshot and was replaced
    Stored(Value),
    /// The record changed since the snapshot was taken; carries the current data
    Conflict(Value),
    /// No record exists at the key
    Missing,
}

/// Tenant-keyed JSON record store.
///
/// Creation and replacement are both `put`. Every call is scoped by a
/// [`StorageKey`] or [`StoragePrefix`], so one tenant can never address
/// another tenant's records.
pub trait StorageProvider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write `data` at `key`, replacing any existing record, and echo it back.
    fn put(
        &self,
        key: StorageKey,
        data: Value,
    ) -> impl Future<Output = Result<Value, Self::Error>> + Send;

    /// Replace the record at `key` only if it still equals `expected`.
    ///
    /// Implementations must perform the comparison and the write as one
    /// atomic step; two callers holding the same snapshot can never both
    /// observe [`PutOutcome::Stored`].
    fn compare_and_put(
        &self,
        key: StorageKey,
        expected: &Value,
        data: Value,
    ) -> impl Future<Output = Result<PutOutcome, Self::Error>> + Send;

    /// Retrieve data by key. `None` if nothing is stored there.
    fn get(
        &self,
        key: StorageKey,
    ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send;

    /// Delete data by key. Returns whether a record existed.
    fn delete(&self, key: StorageKey) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// List records matching a prefix with pagination, ordered by record id.
    ///
    /// An `offset` past the end or a `limit` of 0 yields an empty vector.
    fn list(
        &self,
        prefix: StoragePrefix,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<(StorageKey, Value)>, Self::Error>> + Send;

    fn exists(&self, key: StorageKey) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Count the records matching a prefix.
    fn count(
        &self,
        prefix: StoragePrefix,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    /// List all tenant ids that currently hold at least one record.
    fn list_tenants(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;

    /// Remove every record from every tenant. Intended for tests.
    fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
