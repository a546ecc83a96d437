//! Reconciliation logic for MachineDeployments.
//!
//! Each delivery of a MachineDeployment key runs one pass of a small state
//! machine computed from the fetched object:
//!
//! - `Absent`: nothing to do
//! - `ActiveNoFinalizer`: add the cleanup finalizer, then provision
//! - `ActiveFinalized`: provision
//! - `Deleting`: delete the derived objects, then release the finalizer
//!
//! This module is organized by direction:
//! - `provisioning`: creates the OperatingSystemConfig and bootstrap Secret
//! - `cleanup`: deletes them when the MachineDeployment goes away

pub mod cleanup;
pub mod provisioning;

use crate::credentials::RegistryCredentialsSource;
use crate::error::ControllerError;
use crate::generator::ConfigGenerator;
use crate::reconcile_helpers::{CLEANUP_FINALIZER, add_finalizer, has_finalizer};
use crate::resources::osc::ProvisioningParams;
use cluster_client::{ObjectKey, ResourceStore};
use crds::{MachineDeployment, OperatingSystemConfig, OperatingSystemProfile};
use k8s_openapi::api::core::v1::Secret;
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle state of a MachineDeployment, derived from the fetched object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Object does not exist
    Absent,
    /// Active, cleanup finalizer not yet added
    ActiveNoFinalizer,
    /// Active, cleanup finalizer present
    ActiveFinalized,
    /// Deletion requested
    Deleting {
        /// Whether the cleanup finalizer is still present
        finalizer: bool,
    },
}

impl GroupState {
    /// Computes the state of a (possibly absent) MachineDeployment.
    pub fn of(md: Option<&MachineDeployment>) -> Self {
        let Some(md) = md else {
            return Self::Absent;
        };
        let finalizer = has_finalizer(md, CLEANUP_FINALIZER);
        match (md.metadata.deletion_timestamp.is_some(), finalizer) {
            (true, finalizer) => Self::Deleting { finalizer },
            (false, true) => Self::ActiveFinalized,
            (false, false) => Self::ActiveNoFinalizer,
        }
    }
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to do for this key
    Skipped,
    /// Derived objects deleted and finalizer released
    CleanedUp,
    /// Derived objects present
    Provisioned {
        /// OperatingSystemConfig was created in this pass
        config_created: bool,
        /// Secret was created in this pass
        secret_created: bool,
    },
}

/// Per-kind stores used by the reconciler.
#[derive(Clone)]
pub struct ReconcilerStores {
    /// MachineDeployments (read, finalizer updates)
    pub machine_deployments: Arc<dyn ResourceStore<MachineDeployment>>,
    /// OperatingSystemProfiles (read only)
    pub profiles: Arc<dyn ResourceStore<OperatingSystemProfile>>,
    /// OperatingSystemConfigs
    pub configs: Arc<dyn ResourceStore<OperatingSystemConfig>>,
    /// Bootstrap Secrets
    pub secrets: Arc<dyn ResourceStore<Secret>>,
}

impl std::fmt::Debug for ReconcilerStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilerStores").finish_non_exhaustive()
    }
}

/// Reconciles MachineDeployments into provisioning objects.
pub struct Reconciler {
    pub(crate) stores: ReconcilerStores,
    pub(crate) generator: Arc<dyn ConfigGenerator>,
    pub(crate) credentials: Option<Arc<dyn RegistryCredentialsSource>>,
    pub(crate) params: ProvisioningParams,
    /// Namespace OperatingSystemProfiles are looked up in
    pub(crate) profile_namespace: String,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("profile_namespace", &self.profile_namespace)
            .field("registry_credentials", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler.
    pub fn new(
        stores: ReconcilerStores,
        generator: Arc<dyn ConfigGenerator>,
        params: ProvisioningParams,
        profile_namespace: impl Into<String>,
    ) -> Self {
        Self {
            stores,
            generator,
            credentials: None,
            params,
            profile_namespace: profile_namespace.into(),
        }
    }

    /// Resolves registry credentials from `source` for every new OperatingSystemConfig.
    #[must_use]
    pub fn with_registry_credentials(mut self, source: Arc<dyn RegistryCredentialsSource>) -> Self {
        self.credentials = Some(source);
        self
    }

    /// Runs one reconciliation pass for the MachineDeployment `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ControllerError> {
        let md = self
            .stores
            .machine_deployments
            .get(key)
            .await
            .map_err(|e| ControllerError::cluster(format!("failed to get MachineDeployment {}", key), e))?;

        let state = GroupState::of(md.as_ref());
        debug!("Reconciling MachineDeployment {} in state {:?}", key, state);
        let Some(md) = md else {
            return Ok(ReconcileOutcome::Skipped);
        };

        match state {
            GroupState::Absent | GroupState::Deleting { finalizer: false } => Ok(ReconcileOutcome::Skipped),
            GroupState::Deleting { finalizer: true } => self.cleanup(key, md).await,
            GroupState::ActiveNoFinalizer => {
                let md = self.add_cleanup_finalizer(key, md).await?;
                self.provision(key, &md).await
            }
            GroupState::ActiveFinalized => self.provision(key, &md).await,
        }
    }

    async fn add_cleanup_finalizer(
        &self,
        key: &ObjectKey,
        mut md: MachineDeployment,
    ) -> Result<MachineDeployment, ControllerError> {
        add_finalizer(&mut md, CLEANUP_FINALIZER);
        let updated = self
            .stores
            .machine_deployments
            .update(&md)
            .await
            .map_err(|e| ControllerError::cluster(format!("failed to add finalizer to MachineDeployment {}", key), e))?;
        info!("Added finalizer {} to MachineDeployment {}", CLEANUP_FINALIZER, key);
        Ok(updated)
    }

    /// Parameters for a new OperatingSystemConfig, with fresh registry credentials.
    pub(crate) async fn provisioning_params(&self) -> Result<ProvisioningParams, ControllerError> {
        let mut params = self.params.clone();
        if let Some(source) = &self.credentials {
            params.registry_credentials = source.registry_credentials().await?;
        }
        Ok(params)
    }
}
