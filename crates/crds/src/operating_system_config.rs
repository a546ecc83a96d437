//! OperatingSystemConfig CRD
//!
//! Immutable configuration rendered from an OperatingSystemProfile for one
//! MachineDeployment. Created once and only deleted when its group goes away.

use crate::operating_system_profile::{CloudProviderSpec, File, Unit};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operatingsystemmanager.k8c.io",
    version = "v1alpha1",
    kind = "OperatingSystemConfig",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystemConfigSpec {
    /// Operating system name
    pub os_name: String,

    /// Operating system version
    pub os_version: String,

    /// Cloud provider of the owning MachineDeployment
    pub cloud_provider: CloudProviderSpec,

    /// Rendered files
    #[serde(default)]
    pub files: Vec<File>,

    /// Rendered systemd units
    #[serde(default)]
    pub units: Vec<Unit>,
}
