//! Mock ResourceStore for unit testing
//!
//! This module provides an in-memory implementation of `ResourceStore` that
//! can be used in unit tests without requiring a running cluster.
//!
//! The mock mirrors the API server behaviour the controllers rely on:
//! - `resourceVersion` is assigned on every write and checked on update
//! - creating an existing name fails with `AlreadyExists`
//! - deleting an absent object reports `Ok(false)`
//! - an update that clears the last finalizer of an object marked for
//!   deletion removes the object
//!
//! Finalizers are not honoured on `delete`; the object is removed directly.

use crate::error::ClusterError;
use crate::key::ObjectKey;
use crate::store_trait::ResourceStore;
use kube::Resource;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Store operations that can be counted or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// `get`
    Get,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

/// Mock ResourceStore for testing
///
/// Clones share the same storage, so a test can keep a handle while the
/// reconciler owns another.
pub struct MockStore<K> {
    objects: Arc<Mutex<BTreeMap<ObjectKey, K>>>,
    // One-shot failures, consumed in order of the operation they target
    failures: Arc<Mutex<Vec<MockOperation>>>,
    // Successful calls per operation
    calls: Arc<Mutex<HashMap<MockOperation, usize>>>,
    next_version: Arc<AtomicU64>,
}

impl<K> Clone for MockStore<K> {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
            failures: Arc::clone(&self.failures),
            calls: Arc::clone(&self.calls),
            next_version: Arc::clone(&self.next_version),
        }
    }
}

impl<K> Default for MockStore<K> {
    fn default() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(HashMap::new())),
            next_version: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<K> std::fmt::Debug for MockStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore").finish_non_exhaustive()
    }
}

impl<K> MockStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    /// Create a new, empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the mock store (for test setup)
    ///
    /// Objects without a `resourceVersion` get a fresh one.
    pub async fn insert(&self, mut obj: K) {
        let Some(key) = ObjectKey::from_resource(&obj) else {
            panic!("MockStore::insert requires name and namespace");
        };
        if obj.meta().resource_version.is_none() {
            obj.meta_mut().resource_version = Some(self.next_version());
        }
        self.objects.lock().await.insert(key, obj);
    }

    /// Current copy of an object
    pub async fn object(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().await.get(key).cloned()
    }

    /// All stored objects, ordered by key
    pub async fn objects(&self) -> Vec<K> {
        self.objects.lock().await.values().cloned().collect()
    }

    /// Make the next call of `operation` fail with `Unavailable`
    pub async fn fail_next(&self, operation: MockOperation) {
        self.failures.lock().await.push(operation);
    }

    /// Number of successful calls of `operation`
    pub async fn calls(&self, operation: MockOperation) -> usize {
        self.calls.lock().await.get(&operation).copied().unwrap_or(0)
    }

    fn next_version(&self) -> String {
        self.next_version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    async fn check_failure(&self, operation: MockOperation, key: &ObjectKey) -> Result<(), ClusterError> {
        let mut failures = self.failures.lock().await;
        if let Some(index) = failures.iter().position(|op| *op == operation) {
            failures.remove(index);
            return Err(ClusterError::Unavailable(format!(
                "injected {:?} failure for {} {}",
                operation,
                K::kind(&()),
                key
            )));
        }
        Ok(())
    }

    async fn record(&self, operation: MockOperation) {
        *self.calls.lock().await.entry(operation).or_insert(0) += 1;
    }

    fn key_of(obj: &K) -> Result<ObjectKey, ClusterError> {
        ObjectKey::from_resource(obj)
            .ok_or_else(|| ClusterError::MissingMetadata(format!("{} without name or namespace", K::kind(&()))))
    }
}

#[async_trait::async_trait]
impl<K> ResourceStore<K> for MockStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, ClusterError> {
        self.check_failure(MockOperation::Get, key).await?;
        self.record(MockOperation::Get).await;
        Ok(self.object(key).await)
    }

    async fn create(&self, obj: &K) -> Result<K, ClusterError> {
        let key = Self::key_of(obj)?;
        self.check_failure(MockOperation::Create, &key).await?;

        let mut objects = self.objects.lock().await;
        if objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists(format!("{} {}", K::kind(&()), key)));
        }
        let mut created = obj.clone();
        created.meta_mut().resource_version = Some(self.next_version());
        objects.insert(key, created.clone());
        drop(objects);

        self.record(MockOperation::Create).await;
        Ok(created)
    }

    async fn update(&self, obj: &K) -> Result<K, ClusterError> {
        let key = Self::key_of(obj)?;
        self.check_failure(MockOperation::Update, &key).await?;

        let mut objects = self.objects.lock().await;
        let Some(current) = objects.get(&key) else {
            return Err(ClusterError::NotFound(format!("{} {}", K::kind(&()), key)));
        };
        if let Some(expected) = obj.meta().resource_version.as_deref() {
            if current.meta().resource_version.as_deref() != Some(expected) {
                return Err(ClusterError::Conflict(format!(
                    "{} {} has been modified (expected resourceVersion {})",
                    K::kind(&()),
                    key,
                    expected
                )));
            }
        }

        let mut updated = obj.clone();
        updated.meta_mut().resource_version = Some(self.next_version());
        let finalized = updated.meta().deletion_timestamp.is_some()
            && updated.meta().finalizers.as_ref().is_none_or(Vec::is_empty);
        if finalized {
            objects.remove(&key);
        } else {
            objects.insert(key, updated.clone());
        }
        drop(objects);

        self.record(MockOperation::Update).await;
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, ClusterError> {
        self.check_failure(MockOperation::Delete, key).await?;
        let removed = self.objects.lock().await.remove(key).is_some();
        self.record(MockOperation::Delete).await;
        Ok(removed)
    }
}
