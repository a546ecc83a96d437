//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and a reconciler wired
//! to in-memory stores.

use crate::generator::{CloudInitGenerator, ConfigGenerator};
use crate::reconcile_helpers::CLEANUP_FINALIZER;
use crate::reconciler::{Reconciler, ReconcilerStores};
use crate::resources::MACHINE_DEPLOYMENT_OSP_ANNOTATION;
use crate::resources::osc::ProvisioningParams;
use cluster_client::MockStore;
use crds::*;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Namespace test profiles live in
pub const PROFILE_NAMESPACE: &str = "kube-system";

/// Helper to create a test MachineDeployment on AWS
pub fn machine_deployment(name: &str, namespace: &str, profile: Option<&str>) -> MachineDeployment {
    let annotations = profile.map(|profile| {
        BTreeMap::from([(MACHINE_DEPLOYMENT_OSP_ANNOTATION.to_string(), profile.to_string())])
    });
    MachineDeployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations,
            ..Default::default()
        },
        spec: MachineDeploymentSpec {
            replicas: Some(3),
            template: MachineTemplateSpec {
                spec: MachineSpec {
                    versions: MachineVersionInfo {
                        kubelet: "1.30.2".to_string(),
                    },
                    provider_spec: ProviderSpec {
                        cloud_provider: "aws".to_string(),
                        cloud_provider_spec: serde_json::json!({ "region": "eu-central-1" }),
                        operating_system: "ubuntu".to_string(),
                    },
                },
            },
        },
    }
}

/// Helper to create a test MachineDeployment on GCE
pub fn gce_machine_deployment(name: &str, namespace: &str, profile: &str) -> MachineDeployment {
    let mut md = machine_deployment(name, namespace, Some(profile));
    md.spec.template.spec.provider_spec = ProviderSpec {
        cloud_provider: "gce".to_string(),
        cloud_provider_spec: serde_json::json!({
            "projectId": "my-project",
            "zone": "europe-west3-a",
            "network": "global/networks/default",
            "subnetwork": "",
            "multizone": false,
            "regional": false,
            "tags": ["worker"],
        }),
        operating_system: "ubuntu".to_string(),
    };
    md
}

/// Adds the cleanup finalizer
pub fn finalized(mut md: MachineDeployment) -> MachineDeployment {
    md.metadata.finalizers = Some(vec![CLEANUP_FINALIZER.to_string()]);
    md
}

/// Marks the object for deletion
pub fn deleting(md: MachineDeployment) -> MachineDeployment {
    let mut value = serde_json::to_value(&md).unwrap();
    value["metadata"]["deletionTimestamp"] = serde_json::json!("2026-01-01T00:00:00Z");
    serde_json::from_value(value).unwrap()
}

/// Helper to create a test OperatingSystemProfile
pub fn profile(name: &str, namespace: &str) -> OperatingSystemProfile {
    let mut osp = OperatingSystemProfile::new(
        name,
        OperatingSystemProfileSpec {
            os_name: "ubuntu".to_string(),
            os_version: "22.04".to_string(),
            version: "v1.0.0".to_string(),
            supported_cloud_providers: vec![
                CloudProviderSpec {
                    name: "aws".to_string(),
                    spec: None,
                },
                CloudProviderSpec {
                    name: "gce".to_string(),
                    spec: None,
                },
            ],
            files: vec![
                File {
                    path: "/etc/kubernetes/pki/ca.crt".to_string(),
                    permissions: 644,
                    content: "{{ ca_cert }}".to_string(),
                },
                File {
                    path: "/opt/bin/setup".to_string(),
                    permissions: 755,
                    content: concat!(
                        "#!/bin/bash\n",
                        "KUBELET_VERSION={{ kubelet_version }}\n",
                        "CLUSTER_DNS={{ cluster_dns_ips | join(\",\") }}\n",
                    )
                    .to_string(),
                },
            ],
            units: vec![Unit {
                name: "kubelet.service".to_string(),
                enable: true,
                content: Some(
                    "[Service]\nExecStart=/opt/bin/kubelet --container-runtime-endpoint=unix:///run/{{ container_runtime }}/{{ container_runtime }}.sock\n"
                        .to_string(),
                ),
            }],
        },
    );
    osp.metadata.namespace = Some(namespace.to_string());
    osp
}

/// Provisioning parameters used by the tests
pub fn provisioning_params() -> ProvisioningParams {
    ProvisioningParams {
        cluster_dns_ips: vec!["10.10.10.10".parse().unwrap()],
        ca_cert: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n".to_string(),
        container_runtime: "containerd".to_string(),
        pause_image: "registry.k8s.io/pause:3.9".to_string(),
        ..Default::default()
    }
}

/// Reconciler wired to in-memory stores, with handles on every store.
pub struct TestEnv {
    pub machine_deployments: MockStore<MachineDeployment>,
    pub profiles: MockStore<OperatingSystemProfile>,
    pub configs: MockStore<OperatingSystemConfig>,
    pub secrets: MockStore<Secret>,
    pub reconciler: Reconciler,
}

impl TestEnv {
    /// Environment using the cloud-init generator
    pub fn new() -> Self {
        Self::with_generator(Arc::new(CloudInitGenerator))
    }

    /// Environment using a custom generator
    pub fn with_generator(generator: Arc<dyn ConfigGenerator>) -> Self {
        let machine_deployments = MockStore::new();
        let profiles = MockStore::new();
        let configs = MockStore::new();
        let secrets = MockStore::new();
        let stores = ReconcilerStores {
            machine_deployments: Arc::new(machine_deployments.clone()),
            profiles: Arc::new(profiles.clone()),
            configs: Arc::new(configs.clone()),
            secrets: Arc::new(secrets.clone()),
        };
        Self {
            machine_deployments,
            profiles,
            configs,
            secrets,
            reconciler: Reconciler::new(stores, generator, provisioning_params(), PROFILE_NAMESPACE),
        }
    }
}
