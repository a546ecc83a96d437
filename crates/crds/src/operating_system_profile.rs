//! OperatingSystemProfile CRD
//!
//! Named template describing how machines of one OS are provisioned. File and
//! unit contents are templates rendered per MachineDeployment.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operatingsystemmanager.k8c.io",
    version = "v1alpha1",
    kind = "OperatingSystemProfile",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystemProfileSpec {
    /// Operating system name (e.g. "ubuntu")
    pub os_name: String,

    /// Operating system version (e.g. "22.04")
    pub os_version: String,

    /// Profile version, bumped whenever the profile content changes
    pub version: String,

    /// Cloud providers this profile can provision
    #[serde(default)]
    pub supported_cloud_providers: Vec<CloudProviderSpec>,

    /// Files written on the node; `content` is a template
    #[serde(default)]
    pub files: Vec<File>,

    /// Systemd units; `content` is a template
    #[serde(default)]
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderSpec {
    /// Cloud provider name
    pub name: String,

    /// Provider specific settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Absolute path on the node
    pub path: String,

    /// File mode written as octal digits (e.g. 644)
    #[serde(default = "default_permissions")]
    pub permissions: u32,

    /// File content
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Unit name (e.g. "kubelet.service")
    pub name: String,

    /// Whether the unit is enabled and started on boot
    #[serde(default)]
    pub enable: bool,

    /// Unit file content; units without content only get enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

fn default_permissions() -> u32 {
    644
}
