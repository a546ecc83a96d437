//! MachineDeployment CRD
//!
//! A group of machines sharing provisioning parameters. Owned by the cluster
//! API; only the fields the controller reads are modelled here.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "MachineDeployment",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentSpec {
    /// Desired number of machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Template every machine of the group is created from
    #[serde(default)]
    pub template: MachineTemplateSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateSpec {
    /// Machine spec
    #[serde(default)]
    pub spec: MachineSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Component versions
    #[serde(default)]
    pub versions: MachineVersionInfo,

    /// Provider specific configuration
    #[serde(default)]
    pub provider_spec: ProviderSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineVersionInfo {
    /// Kubelet version (e.g. "1.30.2")
    #[serde(default)]
    pub kubelet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Cloud provider name (e.g. "gce", "aws")
    #[serde(default)]
    pub cloud_provider: String,

    /// Provider specific settings, interpreted per cloud provider
    #[serde(default)]
    pub cloud_provider_spec: serde_json::Value,

    /// Operating system name (e.g. "ubuntu")
    #[serde(default)]
    pub operating_system: String,
}
