//! Bootstrap Secret holding the generated provisioning data.

use super::MACHINE_DEPLOYMENT_OWNER_ANNOTATION;
use cluster_client::ObjectKey;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

/// Namespace bootstrap agents read provisioning Secrets from
pub const CLOUD_INIT_NAMESPACE: &str = "cloud-init-settings";

/// Data key of the provisioning payload
pub const CLOUD_CONFIG_KEY: &str = "cloud-config";

/// Wraps a generated payload into the provisioning Secret of `owner`.
pub fn build_cloud_config_secret(name: &str, namespace: &str, payload: Vec<u8>, owner: &ObjectKey) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(BTreeMap::from([(
                MACHINE_DEPLOYMENT_OWNER_ANNOTATION.to_string(),
                owner.to_string(),
            )])),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(CLOUD_CONFIG_KEY.to_string(), ByteString(payload))])),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::owner_of;

    #[test]
    fn test_build_cloud_config_secret() {
        let owner = ObjectKey::new("ns-a", "md-1");
        let secret = build_cloud_config_secret(
            "md-1-ns-a-provisioning",
            CLOUD_INIT_NAMESPACE,
            b"#cloud-config\n".to_vec(),
            &owner,
        );

        assert_eq!(secret.metadata.name.as_deref(), Some("md-1-ns-a-provisioning"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("cloud-init-settings"));
        assert_eq!(owner_of(&secret.metadata), Some("ns-a/md-1"));
        let data = secret.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[CLOUD_CONFIG_KEY].0, b"#cloud-config\n");
    }
}
