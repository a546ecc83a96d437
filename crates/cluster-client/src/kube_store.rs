//! `ResourceStore` adapter over `kube::Api`

use crate::error::ClusterError;
use crate::key::ObjectKey;
use crate::store_trait::ResourceStore;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::debug;

/// Kubernetes-backed store for one namespaced kind.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    /// Creates a store using the given client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K> Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// HTTP status code of an API error response.
fn status_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

/// Maps well-known API status codes onto specific variants.
fn map_error(err: kube::Error, what: &str) -> ClusterError {
    match status_code(&err) {
        Some(404) => ClusterError::NotFound(what.to_string()),
        Some(409) => match &err {
            kube::Error::Api(response) if response.reason == "AlreadyExists" => {
                ClusterError::AlreadyExists(what.to_string())
            }
            _ => ClusterError::Conflict(what.to_string()),
        },
        Some(429 | 503) => ClusterError::Unavailable(format!("{}: {}", what, err)),
        _ => ClusterError::Kube(err),
    }
}

fn key_of<K: Resource<DynamicType = ()>>(obj: &K) -> Result<ObjectKey, ClusterError> {
    ObjectKey::from_resource(obj)
        .ok_or_else(|| ClusterError::MissingMetadata(format!("{} without name or namespace", K::kind(&()))))
}

#[async_trait::async_trait]
impl<K> ResourceStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, ClusterError> {
        self.api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| map_error(e, &format!("{} {}", K::kind(&()), key)))
    }

    async fn create(&self, obj: &K) -> Result<K, ClusterError> {
        let key = key_of(obj)?;
        let created = self
            .api(&key.namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_error(e, &format!("{} {}", K::kind(&()), key)))?;
        debug!("Created {} {} (resourceVersion {:?})", K::kind(&()), key, created.resource_version());
        Ok(created)
    }

    async fn update(&self, obj: &K) -> Result<K, ClusterError> {
        let key = key_of(obj)?;
        let updated = self
            .api(&key.namespace)
            .replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_error(e, &format!("{} {}", K::kind(&()), key)))?;
        debug!("Updated {} {} (resourceVersion {:?})", K::kind(&()), key, updated.resource_version());
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, ClusterError> {
        match self.api(&key.namespace).delete(&key.name, &DeleteParams::default()).await {
            Ok(_) => {
                debug!("Deleted {} {}", K::kind(&()), key);
                Ok(true)
            }
            Err(e) => match map_error(e, &format!("{} {}", K::kind(&()), key)) {
                ClusterError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }
}
