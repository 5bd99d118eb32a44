//! In-memory storage implementation for workflow records.
//!
//! Records live in one bucket per `(tenant, record type)` pair, each an
//! ordered map from record id to JSON. Suitable for tests, development and
//! embedding where persistence is handled elsewhere.
//!
//! `compare_and_put` takes the write lock for both the comparison and the
//! write, which is what makes concurrent workflow transitions linearizable.

use crate::storage::{PutOutcome, StorageError, StorageKey, StoragePrefix, StorageProvider};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// (tenant_id, resource_type)
type BucketId = (String, String);
type Bucket = BTreeMap<String, Value>;

fn bucket_of(key: &StorageKey) -> BucketId {
    (key.tenant_id().to_string(), key.resource_type().to_string())
}

fn bucket_for_prefix(prefix: &StoragePrefix) -> BucketId {
    (
        prefix.tenant_id().to_string(),
        prefix.resource_type().to_string(),
    )
}

/// Thread-safe in-memory storage.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    buckets: Arc<RwLock<HashMap<BucketId, Bucket>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record counts, for debugging and monitoring.
    pub async fn stats(&self) -> InMemoryStorageStats {
        let buckets = self.buckets.read().await;
        let populated = buckets.iter().filter(|(_, bucket)| !bucket.is_empty());

        let mut tenants = BTreeSet::new();
        let mut resource_type_count = 0;
        let mut total_resources = 0;
        for ((tenant_id, _), bucket) in populated {
            tenants.insert(tenant_id.as_str());
            resource_type_count += 1;
            total_resources += bucket.len();
        }

        InMemoryStorageStats {
            tenant_count: tenants.len(),
            resource_type_count,
            total_resources,
        }
    }
}

impl StorageProvider for InMemoryStorage {
    type Error = StorageError;

    async fn put(&self, key: StorageKey, data: Value) -> Result<Value, Self::Error> {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket_of(&key))
            .or_default()
            .insert(key.resource_id().to_string(), data.clone());
        Ok(data)
    }

    async fn compare_and_put(
        &self,
        key: StorageKey,
        expected: &Value,
        data: Value,
    ) -> Result<PutOutcome, Self::Error> {
        let mut buckets = self.buckets.write().await;
        let slot = buckets
            .get_mut(&bucket_of(&key))
            .and_then(|bucket| bucket.get_mut(key.resource_id()));

        Ok(match slot {
            None => PutOutcome::Missing,
            Some(current) if current != expected => PutOutcome::Conflict(current.clone()),
            Some(current) => {
                *current = data.clone();
                PutOutcome::Stored(data)
            }
        })
    }

    async fn get(&self, key: StorageKey) -> Result<Option<Value>, Self::Error> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(&bucket_of(&key))
            .and_then(|bucket| bucket.get(key.resource_id()))
            .cloned())
    }

    async fn delete(&self, key: StorageKey) -> Result<bool, Self::Error> {
        let mut buckets = self.buckets.write().await;
        Ok(buckets
            .get_mut(&bucket_of(&key))
            .is_some_and(|bucket| bucket.remove(key.resource_id()).is_some()))
    }

    async fn list(
        &self,
        prefix: StoragePrefix,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(StorageKey, Value)>, Self::Error> {
        let buckets = self.buckets.read().await;
        let Some(bucket) = buckets.get(&bucket_for_prefix(&prefix)) else {
            return Ok(Vec::new());
        };

        // BTreeMap iteration is already ordered by record id
        Ok(bucket
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(id, data)| {
                (
                    StorageKey::new(prefix.tenant_id(), prefix.resource_type(), id.as_str()),
                    data.clone(),
                )
            })
            .collect())
    }

    async fn exists(&self, key: StorageKey) -> Result<bool, Self::Error> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(&bucket_of(&key))
            .is_some_and(|bucket| bucket.contains_key(key.resource_id())))
    }

    async fn count(&self, prefix: StoragePrefix) -> Result<usize, Self::Error> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(&bucket_for_prefix(&prefix))
            .map_or(0, BTreeMap::len))
    }

    async fn list_tenants(&self) -> Result<Vec<String>, Self::Error> {
        let buckets = self.buckets.read().await;
        let tenants: BTreeSet<&String> = buckets
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|((tenant_id, _), _)| tenant_id)
            .collect();
        Ok(tenants.into_iter().cloned().collect())
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        self.buckets.write().await.clear();
        Ok(())
    }
}

/// Statistics about the current state of in-memory storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryStorageStats {
    /// Number of tenants with data
    pub tenant_count: usize,
    /// Number of record types across all tenants
    pub resource_type_count: usize,
    /// Total number of individual records
    pub total_resources: usize,
}
