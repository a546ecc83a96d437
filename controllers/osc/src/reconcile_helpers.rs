//! Helper functions for common reconciliation patterns
//!
//! - finalizer bookkeeping on any Kubernetes object
//! - `ensure_named_object`, the create-or-converge path for *mutable*
//!   auxiliary objects (default profiles). Derived provisioning objects are
//!   immutable and never go through it.

use crate::error::ControllerError;
use cluster_client::{ClusterError, ObjectKey, ResourceStore};
use kube::Resource;
use serde::Serialize;
use tracing::{debug, info};

/// Finalizer guarding cleanup of the derived objects of a MachineDeployment
pub const CLEANUP_FINALIZER: &str = "kubermatic.io/cleanup-operating-system-configs";

/// Metadata fields set by the API server, ignored when comparing objects
const SERVER_MANAGED_FIELDS: &[&str] = &["resourceVersion", "uid", "generation", "creationTimestamp", "managedFields"];

/// Whether `obj` carries `finalizer`.
pub fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta().finalizers.as_ref().is_some_and(|finalizers| finalizers.iter().any(|f| f == finalizer))
}

/// Adds `finalizer` to `obj`. Returns `false` if it was already present.
pub fn add_finalizer<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    if has_finalizer(obj, finalizer) {
        return false;
    }
    obj.meta_mut().finalizers.get_or_insert_with(Vec::new).push(finalizer.to_string());
    true
}

/// Removes `finalizer` from `obj`. Returns `false` if it was not present.
pub fn remove_finalizer<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    let Some(finalizers) = obj.meta_mut().finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    before != finalizers.len()
}

/// How an existing object that differs from the desired state is converged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// Replace the object, keeping its identity
    InPlace,
    /// Delete the object and create it again.
    ///
    /// An object held by finalizers still exists right after the delete; the
    /// create then fails with [`ControllerError::Conflict`] and the caller
    /// retries once the old object is gone.
    Recreate,
}

/// What `ensure_named_object` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Object did not exist and was created
    Created,
    /// Object existed and was updated in place
    Updated,
    /// Object existed and was deleted and created again
    Recreated,
    /// Object already matched the desired state
    Unchanged,
}

/// Makes sure the object `key` exists and matches what `creator` produces.
///
/// `creator` receives the current object (`None` if absent) and returns the
/// desired one. Objects are compared structurally, ignoring server managed
/// metadata and status. Name and namespace always come from `key`.
pub async fn ensure_named_object<K, F>(
    store: &dyn ResourceStore<K>,
    key: &ObjectKey,
    creator: F,
    strategy: UpdateStrategy,
) -> Result<EnsureOutcome, ControllerError>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + Send + Sync,
    F: FnOnce(Option<K>) -> Result<K, ControllerError>,
{
    let kind = K::kind(&());
    let existing = store
        .get(key)
        .await
        .map_err(|e| ControllerError::cluster(format!("failed to get {} {}", kind, key), e))?;

    let Some(existing) = existing else {
        let mut desired = creator(None)?;
        set_identity(&mut desired, key);
        desired.meta_mut().resource_version = None;
        store
            .create(&desired)
            .await
            .map_err(|e| ControllerError::cluster(format!("failed to create {} {}", kind, key), e))?;
        info!("Created {} {}", kind, key);
        return Ok(EnsureOutcome::Created);
    };

    let mut desired = creator(Some(existing.clone()))?;
    set_identity(&mut desired, key);
    if comparable(&existing)? == comparable(&desired)? {
        debug!("{} {} already up-to-date", kind, key);
        return Ok(EnsureOutcome::Unchanged);
    }

    match strategy {
        UpdateStrategy::InPlace => {
            if desired.meta().resource_version.is_none() {
                desired.meta_mut().resource_version.clone_from(&existing.meta().resource_version);
            }
            store
                .update(&desired)
                .await
                .map_err(|e| ControllerError::cluster(format!("failed to update {} {}", kind, key), e))?;
            info!("Updated {} {}", kind, key);
            Ok(EnsureOutcome::Updated)
        }
        UpdateStrategy::Recreate => {
            store
                .delete(key)
                .await
                .map_err(|e| ControllerError::cluster(format!("failed to delete {} {}", kind, key), e))?;
            desired.meta_mut().resource_version = None;
            match store.create(&desired).await {
                Ok(_) => {}
                Err(ClusterError::AlreadyExists(_)) => {
                    return Err(ControllerError::Conflict(format!(
                        "{} {} is still being deleted, recreate later",
                        kind, key
                    )));
                }
                Err(e) => return Err(ControllerError::cluster(format!("failed to recreate {} {}", kind, key), e)),
            }
            info!("Recreated {} {}", kind, key);
            Ok(EnsureOutcome::Recreated)
        }
    }
}

fn set_identity<K: Resource>(obj: &mut K, key: &ObjectKey) {
    let meta = obj.meta_mut();
    meta.name = Some(key.name.clone());
    meta.namespace = Some(key.namespace.clone());
}

/// JSON form of an object without server managed fields.
fn comparable<K: Serialize>(obj: &K) -> Result<serde_json::Value, ControllerError> {
    let mut value = serde_json::to_value(obj)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("status");
        if let Some(meta) = object.get_mut("metadata").and_then(serde_json::Value::as_object_mut) {
            for field in SERVER_MANAGED_FIELDS {
                meta.remove(*field);
            }
        }
    }
    Ok(value)
}

#[cfg(test)]
#[path = "reconcile_helpers_test.rs"]
mod reconcile_helpers_test;
