//! Container registry credentials for nodes.
//!
//! Credentials come from a `kubernetes.io/dockerconfigjson` Secret and are
//! read on every reconciliation that builds an OperatingSystemConfig, so a
//! rotated secret is picked up by the next MachineDeployment without a restart.

use crate::error::ControllerError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cluster_client::{ObjectKey, ResourceStore};
use k8s_openapi::api::core::v1::Secret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Data key of a dockerconfigjson Secret
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Credentials for one registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    /// User name
    #[serde(default)]
    pub username: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// `base64(username:password)`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth: String,
}

#[derive(Debug, Deserialize)]
struct DockerConfigJson {
    #[serde(default)]
    auths: BTreeMap<String, RegistryAuth>,
}

/// Source of registry credentials.
#[async_trait::async_trait]
pub trait RegistryCredentialsSource: Send + Sync {
    /// Credentials keyed by registry host.
    async fn registry_credentials(&self) -> Result<BTreeMap<String, RegistryAuth>, ControllerError>;
}

/// Reads credentials from a dockerconfigjson Secret.
pub struct SecretRegistryCredentials {
    secrets: Arc<dyn ResourceStore<Secret>>,
    key: ObjectKey,
}

impl std::fmt::Debug for SecretRegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRegistryCredentials").field("key", &self.key).finish_non_exhaustive()
    }
}

impl SecretRegistryCredentials {
    /// Creates a source reading the Secret `key`.
    pub fn new(secrets: Arc<dyn ResourceStore<Secret>>, key: ObjectKey) -> Self {
        Self { secrets, key }
    }
}

#[async_trait::async_trait]
impl RegistryCredentialsSource for SecretRegistryCredentials {
    async fn registry_credentials(&self) -> Result<BTreeMap<String, RegistryAuth>, ControllerError> {
        let secret = self
            .secrets
            .get(&self.key)
            .await
            .map_err(|e| ControllerError::cluster(format!("failed to get registry credentials secret {}", self.key), e))?
            .ok_or_else(|| ControllerError::Credentials(format!("secret {} not found", self.key)))?;

        let data = secret
            .data
            .as_ref()
            .and_then(|data| data.get(DOCKER_CONFIG_JSON_KEY))
            .ok_or_else(|| ControllerError::Credentials(format!("secret {} has no {} key", self.key, DOCKER_CONFIG_JSON_KEY)))?;

        let credentials = parse_docker_config(&data.0)
            .map_err(|reason| ControllerError::Credentials(format!("secret {}: {}", self.key, reason)))?;
        debug!("Loaded credentials for {} registries from {}", credentials.len(), self.key);
        Ok(credentials)
    }
}

/// Parses a dockerconfigjson document.
///
/// Entries carrying only `auth` get username and password filled in from it.
pub fn parse_docker_config(raw: &[u8]) -> Result<BTreeMap<String, RegistryAuth>, String> {
    let config: DockerConfigJson = serde_json::from_slice(raw).map_err(|e| format!("invalid dockerconfigjson: {}", e))?;

    let mut auths = config.auths;
    for (registry, auth) in &mut auths {
        if auth.username.is_empty() && !auth.auth.is_empty() {
            let decoded = STANDARD
                .decode(&auth.auth)
                .map_err(|e| format!("invalid auth for registry {}: {}", registry, e))?;
            let decoded = String::from_utf8(decoded).map_err(|e| format!("invalid auth for registry {}: {}", registry, e))?;
            let (username, password) = decoded
                .split_once(':')
                .ok_or_else(|| format!("invalid auth for registry {}: missing ':'", registry))?;
            auth.username = username.to_string();
            auth.password = password.to_string();
        }
    }
    Ok(auths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_client::MockStore;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;

    const CONFIG: &str = r#"{
        "auths": {
            "registry.example.com": { "username": "robot", "password": "s3cret" },
            "quay.io": { "auth": "dXNlcjpwYXNz" }
        }
    }"#;

    #[test]
    fn test_parse_docker_config() {
        let auths = parse_docker_config(CONFIG.as_bytes()).unwrap();

        assert_eq!(auths["registry.example.com"].username, "robot");
        assert_eq!(auths["registry.example.com"].password, "s3cret");
        assert_eq!(auths["quay.io"].username, "user");
        assert_eq!(auths["quay.io"].password, "pass");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_docker_config(b"not json").is_err());
        assert!(parse_docker_config(br#"{"auths":{"r":{"auth":"bm9jb2xvbg=="}}}"#).is_err());
    }

    #[tokio::test]
    async fn test_reads_secret() {
        let store = MockStore::<Secret>::new();
        store
            .insert(Secret {
                metadata: ObjectMeta {
                    name: Some("registry".to_string()),
                    namespace: Some("kube-system".to_string()),
                    ..Default::default()
                },
                data: Some(BTreeMap::from([(
                    DOCKER_CONFIG_JSON_KEY.to_string(),
                    ByteString(CONFIG.as_bytes().to_vec()),
                )])),
                ..Default::default()
            })
            .await;

        let source = SecretRegistryCredentials::new(Arc::new(store), ObjectKey::new("kube-system", "registry"));
        let auths = source.registry_credentials().await.unwrap();
        assert_eq!(auths.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let source = SecretRegistryCredentials::new(
            Arc::new(MockStore::<Secret>::new()),
            ObjectKey::new("kube-system", "registry"),
        );
        let err = source.registry_credentials().await.unwrap_err();
        assert!(matches!(err, ControllerError::Credentials(_)));
    }
}
