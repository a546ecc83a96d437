//! ResourceStore trait for mocking
//!
//! This trait abstracts access to one Kubernetes kind so reconcilers can be
//! unit tested against an in-memory implementation.

use crate::error::ClusterError;
use crate::key::ObjectKey;

/// Typed get/create/update/delete for one namespaced kind.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ResourceStore<K>: Send + Sync
where
    K: Send + Sync,
{
    /// Fetches an object; `Ok(None)` when it does not exist.
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, ClusterError>;

    /// Creates an object; fails with `AlreadyExists` if the name is taken.
    async fn create(&self, obj: &K) -> Result<K, ClusterError>;

    /// Replaces an object. When the object carries a `resourceVersion` the
    /// write only succeeds if it still matches (`Conflict` otherwise).
    async fn update(&self, obj: &K) -> Result<K, ClusterError>;

    /// Deletes an object; `Ok(false)` when it was already absent.
    async fn delete(&self, key: &ObjectKey) -> Result<bool, ClusterError>;
}
