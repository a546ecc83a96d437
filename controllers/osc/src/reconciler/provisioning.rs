//! Forward provisioning: OperatingSystemConfig first, then the bootstrap Secret.
//!
//! Both objects are created once and never updated. Every step re-checks
//! existence, so a pass interrupted between the two creates only finishes the
//! missing part on the next delivery.

use super::{ReconcileOutcome, Reconciler};
use crate::error::ControllerError;
use crate::resources::osc::build_operating_system_config;
use crate::resources::secret::{CLOUD_INIT_NAMESPACE, build_cloud_config_secret};
use crate::resources::{owner_of, profile_name, provisioning_name};
use cluster_client::{ClusterError, ObjectKey};
use crds::MachineDeployment;
use kube::api::ObjectMeta;
use tracing::{debug, info};

/// Fails with `NameCollision` if `meta` records an owner other than `md_key`.
fn check_owner(kind: &'static str, key: &ObjectKey, meta: &ObjectMeta, md_key: &ObjectKey) -> Result<(), ControllerError> {
    match owner_of(meta) {
        Some(owner) if owner != md_key.to_string() => Err(ControllerError::NameCollision {
            kind,
            name: key.to_string(),
            owner: owner.to_string(),
            machine_deployment: md_key.to_string(),
        }),
        _ => Ok(()),
    }
}

impl Reconciler {
    pub(super) async fn provision(
        &self,
        md_key: &ObjectKey,
        md: &MachineDeployment,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let name = provisioning_name(md_key);
        let config_created = self.reconcile_operating_system_config(md_key, md, &name).await?;
        let secret_created = self.reconcile_secret(md_key, &name).await?;
        Ok(ReconcileOutcome::Provisioned {
            config_created,
            secret_created,
        })
    }

    /// Creates the OperatingSystemConfig unless it exists. Returns whether it was created.
    async fn reconcile_operating_system_config(
        &self,
        md_key: &ObjectKey,
        md: &MachineDeployment,
        name: &str,
    ) -> Result<bool, ControllerError> {
        let osc_key = ObjectKey::new(&md_key.namespace, name);
        let existing = self
            .stores
            .configs
            .get(&osc_key)
            .await
            .map_err(|e| ControllerError::cluster(format!("failed to get OperatingSystemConfig {}", osc_key), e))?;
        if let Some(existing) = existing {
            check_owner("OperatingSystemConfig", &osc_key, &existing.metadata, md_key)?;
            debug!("OperatingSystemConfig {} already exists", osc_key);
            return Ok(false);
        }

        let profile = profile_name(md).ok_or_else(|| ControllerError::MissingProfileAnnotation(md_key.to_string()))?;
        let osp_key = ObjectKey::new(&self.profile_namespace, profile);
        let osp = self
            .stores
            .profiles
            .get(&osp_key)
            .await
            .map_err(|e| ControllerError::cluster(format!("failed to get OperatingSystemProfile {}", osp_key), e))?
            .ok_or_else(|| ControllerError::ProfileNotFound(osp_key.to_string()))?;

        let params = self.provisioning_params().await?;
        let osc = build_operating_system_config(md, &osp, name, &md_key.namespace, &params)?;

        match self.stores.configs.create(&osc).await {
            Ok(_) => {
                info!(
                    "Created OperatingSystemConfig {} for MachineDeployment {} from profile {} ({})",
                    osc_key, md_key, osp_key, osp.spec.version
                );
                Ok(true)
            }
            // Created concurrently; ownership is checked again by the secret step
            Err(ClusterError::AlreadyExists(_)) => {
                debug!("OperatingSystemConfig {} appeared concurrently", osc_key);
                Ok(false)
            }
            Err(e) => Err(ControllerError::cluster(
                format!("failed to create OperatingSystemConfig {} for MachineDeployment {}", osc_key, md_key),
                e,
            )),
        }
    }

    /// Creates the bootstrap Secret unless it exists. Returns whether it was created.
    async fn reconcile_secret(&self, md_key: &ObjectKey, name: &str) -> Result<bool, ControllerError> {
        let secret_key = ObjectKey::new(CLOUD_INIT_NAMESPACE, name);
        let existing = self
            .stores
            .secrets
            .get(&secret_key)
            .await
            .map_err(|e| ControllerError::cluster(format!("failed to get Secret {}", secret_key), e))?;
        if let Some(existing) = existing {
            check_owner("Secret", &secret_key, &existing.metadata, md_key)?;
            debug!("Secret {} already exists", secret_key);
            return Ok(false);
        }

        let osc_key = ObjectKey::new(&md_key.namespace, name);
        let osc = self
            .stores
            .configs
            .get(&osc_key)
            .await
            .map_err(|e| ControllerError::cluster(format!("failed to get OperatingSystemConfig {}", osc_key), e))?
            .ok_or_else(|| ControllerError::DerivedObjectMissing(format!("OperatingSystemConfig {}", osc_key)))?;
        check_owner("OperatingSystemConfig", &osc_key, &osc.metadata, md_key)?;

        let payload = self.generator.generate(&osc).map_err(|source| ControllerError::Generation {
            name: osc_key.to_string(),
            source,
        })?;
        let secret = build_cloud_config_secret(name, CLOUD_INIT_NAMESPACE, payload, md_key);

        match self.stores.secrets.create(&secret).await {
            Ok(_) => {
                info!("Created Secret {} for MachineDeployment {}", secret_key, md_key);
                Ok(true)
            }
            Err(ClusterError::AlreadyExists(_)) => {
                debug!("Secret {} appeared concurrently", secret_key);
                Ok(false)
            }
            Err(e) => Err(ControllerError::cluster(
                format!("failed to create Secret {} for MachineDeployment {}", secret_key, md_key),
                e,
            )),
        }
    }
}
