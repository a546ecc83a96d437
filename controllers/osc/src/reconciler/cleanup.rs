//! Finalizer-gated cleanup of the derived objects.
//!
//! Order: Secret, OperatingSystemConfig, then the finalizer. Releasing the
//! finalizer is the last write, so an interrupted cleanup is resumed on the
//! next delivery.

use super::{ReconcileOutcome, Reconciler};
use crate::error::ControllerError;
use crate::reconcile_helpers::{CLEANUP_FINALIZER, remove_finalizer};
use crate::resources::secret::CLOUD_INIT_NAMESPACE;
use crate::resources::{is_owned_by, owner_of, provisioning_name};
use cluster_client::{ObjectKey, ResourceStore};
use crds::MachineDeployment;
use kube::Resource;
use tracing::{debug, info, warn};

impl Reconciler {
    pub(super) async fn cleanup(
        &self,
        md_key: &ObjectKey,
        mut md: MachineDeployment,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let name = provisioning_name(md_key);

        delete_owned(&*self.stores.secrets, &ObjectKey::new(CLOUD_INIT_NAMESPACE, &name), md_key).await?;
        delete_owned(&*self.stores.configs, &ObjectKey::new(&md_key.namespace, &name), md_key).await?;

        remove_finalizer(&mut md, CLEANUP_FINALIZER);
        self.stores.machine_deployments.update(&md).await.map_err(|e| {
            ControllerError::cluster(format!("failed to remove finalizer from MachineDeployment {}", md_key), e)
        })?;
        info!("Cleaned up provisioning objects of MachineDeployment {}", md_key);
        Ok(ReconcileOutcome::CleanedUp)
    }
}

/// Deletes `key` if it exists and belongs to `md_key`. Absent objects are fine.
async fn delete_owned<K>(store: &dyn ResourceStore<K>, key: &ObjectKey, md_key: &ObjectKey) -> Result<(), ControllerError>
where
    K: Resource<DynamicType = ()> + Send + Sync,
{
    let kind = K::kind(&());
    let existing = store
        .get(key)
        .await
        .map_err(|e| ControllerError::cluster(format!("failed to get {} {}", kind, key), e))?;

    match existing {
        None => debug!("{} {} already absent", kind, key),
        Some(obj) if !is_owned_by(obj.meta(), md_key) => {
            warn!(
                "Not deleting {} {}: it belongs to MachineDeployment {}",
                kind,
                key,
                owner_of(obj.meta()).unwrap_or_default()
            );
        }
        Some(_) => {
            let deleted = store
                .delete(key)
                .await
                .map_err(|e| ControllerError::cluster(format!("failed to delete {} {}", kind, key), e))?;
            if deleted {
                info!("Deleted {} {}", kind, key);
            }
        }
    }
    Ok(())
}
