//! Tenant-keyed persistence of form instances with conditional writes.
//!
//! Instances are stored as JSON under `tenant_id/FormInstance/instance_id`.
//! Every read hands back the raw stored record as a snapshot; a later
//! [`InstanceStore::save_conditional`] only succeeds if the record still
//! equals that snapshot, which makes read-check-write transitions
//! linearizable per instance.

use super::types::FormInstance;
use super::version::InstanceVersion;
use crate::error::{WorkflowError, WorkflowResult};
use crate::storage::{PutOutcome, StorageError, StorageKey, StorageProvider};
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

/// Storage resource type for form instances.
pub const RESOURCE_TYPE: &str = "FormInstance";

const LIST_PAGE_SIZE: usize = 256;

/// An instance together with the stored record it was decoded from.
#[derive(Debug, Clone)]
pub struct VersionedInstance {
    pub instance: FormInstance,
    pub version: InstanceVersion,
    snapshot: Value,
}

impl VersionedInstance {
    fn from_stored(snapshot: Value) -> WorkflowResult<Self> {
        let instance: FormInstance = serde_json::from_value(snapshot.clone()).map_err(|e| {
            WorkflowError::Storage(StorageError::serialization(e.to_string(), RESOURCE_TYPE))
        })?;
        Ok(Self {
            version: InstanceVersion::from_value(&snapshot),
            instance,
            snapshot,
        })
    }

    pub fn into_parts(self) -> (FormInstance, InstanceVersion) {
        (self.instance, self.version)
    }
}

/// Instance repository over a [`StorageProvider`].
#[derive(Debug)]
pub struct InstanceStore<S> {
    storage: Arc<S>,
}

impl<S> Clone for InstanceStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S> InstanceStore<S>
where
    S: StorageProvider,
    S::Error: Into<StorageError>,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Store a new instance.
    pub async fn insert(&self, instance: &FormInstance) -> WorkflowResult<VersionedInstance> {
        let key = key_for(&instance.tenant_id, &instance.id);
        if self.storage.exists(key.clone()).await.map_err(storage_error)? {
            return Err(WorkflowError::Storage(StorageError::already_exists(&key)));
        }
        let stored = self
            .storage
            .put(key, serde_json::to_value(instance)?)
            .await
            .map_err(storage_error)?;
        debug!(
            "Inserted form instance '{}' in tenant '{}'",
            instance.id, instance.tenant_id
        );
        VersionedInstance::from_stored(stored)
    }

    /// Read an instance, soft-deleted ones included.
    pub async fn load(&self, tenant_id: &str, id: &str) -> WorkflowResult<Option<VersionedInstance>> {
        let stored = self
            .storage
            .get(key_for(tenant_id, id))
            .await
            .map_err(storage_error)?;
        stored.map(VersionedInstance::from_stored).transpose()
    }

    /// Read a live instance for a transition.
    ///
    /// Soft-deleted instances are reported as not found. When the caller
    /// supplies the version it observed, a mismatch is reported as
    /// `StaleState` before any work is done.
    pub async fn load_for_update(
        &self,
        tenant_id: &str,
        id: &str,
        expected: Option<&InstanceVersion>,
    ) -> WorkflowResult<VersionedInstance> {
        let current = self
            .load(tenant_id, id)
            .await?
            .filter(|versioned| !versioned.instance.is_deleted())
            .ok_or_else(|| WorkflowError::instance_not_found(tenant_id, id))?;

        if let Some(expected) = expected {
            if *expected != current.version {
                debug!(
                    "Version mismatch loading form instance '{}' in tenant '{}': expected {}, found {}",
                    id, tenant_id, expected, current.version
                );
                return Err(WorkflowError::StaleState {
                    instance_id: id.to_string(),
                    expected: expected.to_string(),
                    current: current.version.to_string(),
                });
            }
        }
        Ok(current)
    }

    /// Write `updated` only if the stored record still equals `previous`.
    pub async fn save_conditional(
        &self,
        previous: &VersionedInstance,
        updated: &FormInstance,
    ) -> WorkflowResult<VersionedInstance> {
        let tenant_id = &previous.instance.tenant_id;
        let id = &previous.instance.id;
        if updated.tenant_id != *tenant_id || updated.id != *id {
            return Err(WorkflowError::invalid_request(
                "an instance's id and tenant cannot change",
            ));
        }

        let outcome = self
            .storage
            .compare_and_put(
                key_for(tenant_id, id),
                &previous.snapshot,
                serde_json::to_value(updated)?,
            )
            .await
            .map_err(storage_error)?;

        match outcome {
            PutOutcome::Stored(stored) => VersionedInstance::from_stored(stored),
            PutOutcome::Conflict(current) => {
                let current = InstanceVersion::from_value(&current);
                warn!(
                    "Concurrent modification of form instance '{}' in tenant '{}': expected {}, found {}",
                    id, tenant_id, previous.version, current
                );
                Err(WorkflowError::StaleState {
                    instance_id: id.clone(),
                    expected: previous.version.to_string(),
                    current: current.to_string(),
                })
            }
            PutOutcome::Missing => Err(WorkflowError::instance_not_found(tenant_id, id)),
        }
    }

    /// All live instances of a tenant, ordered by id.
    pub async fn list_for_tenant(&self, tenant_id: &str) -> WorkflowResult<Vec<VersionedInstance>> {
        let mut instances = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .storage
                .list(StorageKey::prefix(tenant_id, RESOURCE_TYPE), offset, LIST_PAGE_SIZE)
                .await
                .map_err(storage_error)?;
            let fetched = page.len();
            for (_, stored) in page {
                let versioned = VersionedInstance::from_stored(stored)?;
                if !versioned.instance.is_deleted() {
                    instances.push(versioned);
                }
            }
            if fetched < LIST_PAGE_SIZE {
                break;
            }
            offset += fetched;
        }
        Ok(instances)
    }
}

fn key_for(tenant_id: &str, id: &str) -> StorageKey {
    StorageKey::new(tenant_id, RESOURCE_TYPE, id)
}

fn storage_error<E: Into<StorageError>>(error: E) -> WorkflowError {
    WorkflowError::Storage(error.into())
}
