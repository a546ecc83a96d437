//! OperatingSystemConfig generation.
//!
//! Renders every file and unit template of an OperatingSystemProfile against
//! the provisioning parameters of one MachineDeployment. The result is
//! deterministic for the same inputs and is never updated once created.

use super::{MACHINE_DEPLOYMENT_OSP_ANNOTATION, MACHINE_DEPLOYMENT_OWNER_ANNOTATION, OSP_VERSION_ANNOTATION};
use crate::credentials::RegistryAuth;
use crate::error::ControllerError;
use cloud_config::{CloudConfig, GlobalOpts};
use cluster_client::ObjectKey;
use crds::{
    CloudProviderSpec, File, MachineDeployment, OperatingSystemConfig, OperatingSystemConfigSpec,
    OperatingSystemProfile, Unit,
};
use kube::api::ObjectMeta;
use minijinja::{Environment, UndefinedBehavior, Value, context};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Path of the provider cloud config written on the node
pub const CLOUD_CONFIG_PATH: &str = "/etc/kubernetes/cloud-config";

/// Node provisioning parameters shared by every MachineDeployment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisioningParams {
    /// Cluster DNS server addresses handed to the kubelet
    pub cluster_dns_ips: Vec<IpAddr>,
    /// Cluster CA certificate (PEM)
    pub ca_cert: String,
    /// Container runtime ("containerd" or "docker")
    pub container_runtime: String,
    /// Sandbox (pause) image override
    pub pause_image: String,
    /// Taints registered by the kubelet, `key=value:Effect` comma separated
    pub initial_taints: String,
    /// Whether an external cloud controller manager is used
    pub external_cloud_provider: bool,
    /// HTTP(S) proxy for the node
    pub node_http_proxy: String,
    /// Hosts excluded from the proxy
    pub node_no_proxy: String,
    /// Kubelet feature gates
    pub kubelet_feature_gates: BTreeMap<String, bool>,
    /// Registry credentials keyed by registry host
    pub registry_credentials: BTreeMap<String, RegistryAuth>,
}

impl ProvisioningParams {
    /// Feature gates in kubelet flag form (`A=true,B=false`).
    pub fn feature_gates_flag(&self) -> String {
        self.kubelet_feature_gates
            .iter()
            .map(|(gate, enabled)| format!("{}={}", gate, enabled))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Settings read from a GCE `cloudProviderSpec`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GceProviderSpec {
    project_id: String,
    zone: String,
    network: String,
    subnetwork: String,
    multizone: bool,
    regional: bool,
    tags: Vec<String>,
}

/// Builds the OperatingSystemConfig `name` in `namespace` for a MachineDeployment.
pub fn build_operating_system_config(
    md: &MachineDeployment,
    osp: &OperatingSystemProfile,
    name: &str,
    namespace: &str,
    params: &ProvisioningParams,
) -> Result<OperatingSystemConfig, ControllerError> {
    let md_key = ObjectKey::from_resource(md)
        .ok_or_else(|| ControllerError::InvalidConfig("MachineDeployment missing name or namespace".to_string()))?;
    let osp_key = ObjectKey::from_resource(osp)
        .ok_or_else(|| ControllerError::InvalidConfig("OperatingSystemProfile missing name or namespace".to_string()))?;

    let provider_spec = &md.spec.template.spec.provider_spec;
    let provider = provider_spec.cloud_provider.as_str();
    if !osp.spec.supported_cloud_providers.iter().any(|p| p.name == provider) {
        return Err(ControllerError::UnsupportedCloudProvider {
            profile: osp_key.to_string(),
            provider: provider.to_string(),
        });
    }

    let cloud_config = provider_cloud_config(md, &md_key)?;
    let ctx = template_context(md, &md_key, osp, params, cloud_config.as_deref().unwrap_or_default());

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    let render = |what: &str, source: &str| {
        env.render_str(source, &ctx).map_err(|e| ControllerError::InvalidProfile {
            profile: osp_key.to_string(),
            reason: format!("failed to render {}: {}", what, e),
        })
    };

    let mut files = Vec::with_capacity(osp.spec.files.len() + 1);
    for file in &osp.spec.files {
        files.push(File {
            path: file.path.clone(),
            permissions: file.permissions,
            content: render(&file.path, &file.content)?,
        });
    }
    if let Some(content) = cloud_config {
        files.push(File {
            path: CLOUD_CONFIG_PATH.to_string(),
            permissions: 600,
            content,
        });
    }

    let mut units = Vec::with_capacity(osp.spec.units.len());
    for unit in &osp.spec.units {
        let content = match &unit.content {
            Some(content) => Some(render(&unit.name, content)?),
            None => None,
        };
        units.push(Unit {
            name: unit.name.clone(),
            enable: unit.enable,
            content,
        });
    }

    let annotations = BTreeMap::from([
        (MACHINE_DEPLOYMENT_OWNER_ANNOTATION.to_string(), md_key.to_string()),
        (MACHINE_DEPLOYMENT_OSP_ANNOTATION.to_string(), osp_key.name.clone()),
        (OSP_VERSION_ANNOTATION.to_string(), osp.spec.version.clone()),
    ]);

    Ok(OperatingSystemConfig {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: OperatingSystemConfigSpec {
            os_name: osp.spec.os_name.clone(),
            os_version: osp.spec.os_version.clone(),
            cloud_provider: CloudProviderSpec {
                name: provider.to_string(),
                spec: (!provider_spec.cloud_provider_spec.is_null()).then(|| provider_spec.cloud_provider_spec.clone()),
            },
            files,
            units,
        },
    })
}

/// Renders the provider cloud config file, for providers that need one.
fn provider_cloud_config(md: &MachineDeployment, md_key: &ObjectKey) -> Result<Option<String>, ControllerError> {
    let provider_spec = &md.spec.template.spec.provider_spec;
    match provider_spec.cloud_provider.as_str() {
        "gce" => {
            let spec: GceProviderSpec = if provider_spec.cloud_provider_spec.is_null() {
                GceProviderSpec::default()
            } else {
                serde_json::from_value(provider_spec.cloud_provider_spec.clone()).map_err(|e| {
                    ControllerError::InvalidProviderSpec {
                        machine_deployment: md_key.to_string(),
                        reason: e.to_string(),
                    }
                })?
            };
            let config = CloudConfig {
                global: GlobalOpts {
                    project_id: spec.project_id,
                    local_zone: spec.zone,
                    network_name: spec.network,
                    subnetwork_name: spec.subnetwork,
                    multizone: spec.multizone,
                    regional: spec.regional,
                    node_tags: spec.tags,
                },
            };
            Ok(Some(config.render()?))
        }
        _ => Ok(None),
    }
}

fn template_context(
    md: &MachineDeployment,
    md_key: &ObjectKey,
    osp: &OperatingSystemProfile,
    params: &ProvisioningParams,
    cloud_config: &str,
) -> Value {
    let cluster_dns_ips: Vec<String> = params.cluster_dns_ips.iter().map(ToString::to_string).collect();
    context! {
        machine_deployment_name => &md_key.name,
        machine_deployment_namespace => &md_key.namespace,
        kubelet_version => &md.spec.template.spec.versions.kubelet,
        cloud_provider_name => &md.spec.template.spec.provider_spec.cloud_provider,
        cloud_config => cloud_config,
        os_name => &osp.spec.os_name,
        os_version => &osp.spec.os_version,
        cluster_dns_ips => cluster_dns_ips,
        ca_cert => &params.ca_cert,
        container_runtime => &params.container_runtime,
        pause_image => &params.pause_image,
        initial_taints => &params.initial_taints,
        external_cloud_provider => params.external_cloud_provider,
        http_proxy => &params.node_http_proxy,
        no_proxy => &params.node_no_proxy,
        kubelet_feature_gates => &params.kubelet_feature_gates,
        kubelet_feature_gates_flag => params.feature_gates_flag(),
        registry_credentials => &params.registry_credentials,
    }
}
