//! Derived objects created for a MachineDeployment.
//!
//! - `osc`: builds the immutable OperatingSystemConfig from a profile
//! - `secret`: wraps generated provisioning data into the bootstrap Secret
//!
//! Both objects share one deterministic name and carry an owner annotation
//! pointing back at the MachineDeployment they were derived from.

pub mod osc;
pub mod secret;

use cluster_client::ObjectKey;
use crds::MachineDeployment;
use kube::api::ObjectMeta;

/// Annotation on a MachineDeployment naming the OperatingSystemProfile to use
pub const MACHINE_DEPLOYMENT_OSP_ANNOTATION: &str = "k8c.io/operating-system-profile";

/// Annotation on derived objects recording the owning MachineDeployment (`namespace/name`)
pub const MACHINE_DEPLOYMENT_OWNER_ANNOTATION: &str = "k8c.io/machine-deployment";

/// Annotation on OperatingSystemConfigs recording the profile version they were rendered from
pub const OSP_VERSION_ANNOTATION: &str = "k8c.io/operating-system-profile-version";

/// Subresource kind tag of the provisioning config
pub const PROVISIONING_CLOUD_CONFIG: &str = "provisioning";

/// Name of the derived objects of a MachineDeployment.
pub fn machine_deployment_subresource_name(name: &str, namespace: &str, kind: &str) -> String {
    format!("{}-{}-{}", name, namespace, kind)
}

/// Name of the provisioning OperatingSystemConfig and Secret of a MachineDeployment.
pub fn provisioning_name(md_key: &ObjectKey) -> String {
    machine_deployment_subresource_name(&md_key.name, &md_key.namespace, PROVISIONING_CLOUD_CONFIG)
}

/// Profile name selected by the MachineDeployment, `None` if unset or empty.
pub fn profile_name(md: &MachineDeployment) -> Option<&str> {
    md.metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(MACHINE_DEPLOYMENT_OSP_ANNOTATION))
        .map(String::as_str)
        .filter(|name| !name.trim().is_empty())
}

/// Owner recorded on a derived object, if any.
pub fn owner_of(meta: &ObjectMeta) -> Option<&str> {
    meta.annotations
        .as_ref()
        .and_then(|annotations| annotations.get(MACHINE_DEPLOYMENT_OWNER_ANNOTATION))
        .map(String::as_str)
}

/// Whether a derived object belongs to the given MachineDeployment.
///
/// Objects without an owner annotation are treated as owned.
pub fn is_owned_by(meta: &ObjectMeta, md_key: &ObjectKey) -> bool {
    owner_of(meta).is_none_or(|owner| owner == md_key.to_string())
}
