//! Controller configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `WATCH_NAMESPACE` | all namespaces |
//! | `OSP_NAMESPACE` | `kube-system` |
//! | `WORKER_COUNT` | `10` |
//! | `RECONCILE_TIMEOUT_SECS` | `60` |
//! | `METRICS_ADDR` | `0.0.0.0:8080` |
//! | `SYNC_DEFAULT_PROFILES` | `true` |
//! | `CLUSTER_DNS_IPS` | `10.10.10.10` |
//! | `CA_CERT` / `CA_CERT_FILE` | empty |
//! | `CONTAINER_RUNTIME` | `containerd` |
//! | `PAUSE_IMAGE`, `INITIAL_TAINTS`, `NODE_HTTP_PROXY`, `NODE_NO_PROXY` | empty |
//! | `EXTERNAL_CLOUD_PROVIDER` | `false` |
//! | `NODE_REGISTRY_CREDENTIALS_SECRET` | unset (`namespace/name`) |
//! | `KUBELET_FEATURE_GATES` | empty (`Gate=true,Other=false`) |

use crate::error::ControllerError;
use crate::resources::osc::ProvisioningParams;
use cluster_client::ObjectKey;
use std::collections::BTreeMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_OSP_NAMESPACE: &str = "kube-system";
const DEFAULT_WORKER_COUNT: usize = 10;
const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CLUSTER_DNS_IPS: &str = "10.10.10.10";
const DEFAULT_CONTAINER_RUNTIME: &str = "containerd";
const SUPPORTED_CONTAINER_RUNTIMES: &[&str] = &["containerd", "docker"];

/// Controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Namespace to watch MachineDeployments in; `None` watches all
    pub watch_namespace: Option<String>,
    /// Namespace OperatingSystemProfiles live in
    pub osp_namespace: String,
    /// Number of reconciliation workers
    pub worker_count: usize,
    /// Deadline of one reconciliation
    pub reconcile_timeout: Duration,
    /// Address of the metrics and probe server
    pub metrics_addr: SocketAddr,
    /// Whether to install the bundled default profiles at startup
    pub sync_default_profiles: bool,
    /// Secret holding registry credentials for nodes
    pub registry_credentials_secret: Option<ObjectKey>,
    /// File the CA certificate is read from when `CA_CERT` is unset
    pub ca_cert_file: Option<PathBuf>,
    /// Parameters rendered into every OperatingSystemConfig
    pub params: ProvisioningParams,
}

impl ControllerConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        let mut config = Self::from_lookup(|name| env::var(name).ok())?;
        config.load_ca_cert()?;
        Ok(config)
    }

    /// Loads the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let worker_count = parse_number(var("WORKER_COUNT"), "WORKER_COUNT", DEFAULT_WORKER_COUNT)?;
        if worker_count == 0 {
            return Err(ControllerError::InvalidConfig("WORKER_COUNT must be at least 1".to_string()));
        }
        let timeout_secs = parse_number(
            var("RECONCILE_TIMEOUT_SECS"),
            "RECONCILE_TIMEOUT_SECS",
            DEFAULT_RECONCILE_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        let metrics_addr = var("METRICS_ADDR").unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = metrics_addr
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("invalid METRICS_ADDR {:?}: {}", metrics_addr, e)))?;

        let container_runtime = var("CONTAINER_RUNTIME").unwrap_or_else(|| DEFAULT_CONTAINER_RUNTIME.to_string());
        if !SUPPORTED_CONTAINER_RUNTIMES.contains(&container_runtime.as_str()) {
            return Err(ControllerError::InvalidConfig(format!(
                "unsupported CONTAINER_RUNTIME {:?} (expected one of {})",
                container_runtime,
                SUPPORTED_CONTAINER_RUNTIMES.join(", ")
            )));
        }

        let registry_credentials_secret = var("NODE_REGISTRY_CREDENTIALS_SECRET")
            .map(|value| {
                ObjectKey::parse(&value).ok_or_else(|| {
                    ControllerError::InvalidConfig(format!(
                        "NODE_REGISTRY_CREDENTIALS_SECRET must be namespace/name, got {:?}",
                        value
                    ))
                })
            })
            .transpose()?;

        let params = ProvisioningParams {
            cluster_dns_ips: parse_ip_list(&var("CLUSTER_DNS_IPS").unwrap_or_else(|| DEFAULT_CLUSTER_DNS_IPS.to_string()))?,
            ca_cert: lookup("CA_CERT").unwrap_or_default(),
            container_runtime,
            pause_image: var("PAUSE_IMAGE").unwrap_or_default(),
            initial_taints: var("INITIAL_TAINTS").unwrap_or_default(),
            external_cloud_provider: parse_bool(var("EXTERNAL_CLOUD_PROVIDER"), "EXTERNAL_CLOUD_PROVIDER", false)?,
            node_http_proxy: var("NODE_HTTP_PROXY").unwrap_or_default(),
            node_no_proxy: var("NODE_NO_PROXY").unwrap_or_default(),
            kubelet_feature_gates: parse_feature_gates(&var("KUBELET_FEATURE_GATES").unwrap_or_default())?,
            registry_credentials: BTreeMap::new(),
        };

        Ok(Self {
            watch_namespace: var("WATCH_NAMESPACE"),
            osp_namespace: var("OSP_NAMESPACE").unwrap_or_else(|| DEFAULT_OSP_NAMESPACE.to_string()),
            worker_count,
            reconcile_timeout: Duration::from_secs(timeout_secs),
            metrics_addr,
            sync_default_profiles: parse_bool(var("SYNC_DEFAULT_PROFILES"), "SYNC_DEFAULT_PROFILES", true)?,
            registry_credentials_secret,
            ca_cert_file: var("CA_CERT_FILE").map(PathBuf::from),
            params,
        })
    }

    /// Reads the CA certificate from `ca_cert_file` unless given inline.
    pub fn load_ca_cert(&mut self) -> Result<(), ControllerError> {
        let Some(path) = &self.ca_cert_file else {
            return Ok(());
        };
        if !self.params.ca_cert.is_empty() {
            return Ok(());
        }
        self.params.ca_cert = std::fs::read_to_string(path)
            .map_err(|e| ControllerError::InvalidConfig(format!("failed to read CA_CERT_FILE {}: {}", path.display(), e)))?;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, name: &str, default: T) -> Result<T, ControllerError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("invalid {} {:?}: {}", name, value, e))),
    }
}

fn parse_bool(value: Option<String>, name: &str, default: bool) -> Result<bool, ControllerError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(ControllerError::InvalidConfig(format!("invalid {} {:?}: expected a boolean", name, other))),
    }
}

/// Parses a comma separated list of IP addresses.
pub fn parse_ip_list(value: &str) -> Result<Vec<IpAddr>, ControllerError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(|ip| {
            ip.parse()
                .map_err(|e| ControllerError::InvalidConfig(format!("invalid cluster DNS IP {:?}: {}", ip, e)))
        })
        .collect()
}

/// Parses `Gate=true,Other=false`.
pub fn parse_feature_gates(value: &str) -> Result<BTreeMap<String, bool>, ControllerError> {
    let mut gates = BTreeMap::new();
    for entry in value.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (gate, enabled) = entry
            .split_once('=')
            .ok_or_else(|| ControllerError::InvalidConfig(format!("invalid feature gate {:?}: expected Gate=bool", entry)))?;
        let enabled = parse_bool(Some(enabled.trim().to_string()), gate, false)?;
        gates.insert(gate.trim().to_string(), enabled);
    }
    Ok(gates)
}
