//! Operating System Config Controller
//!
//! Provisions node bootstrap data for MachineDeployments:
//! - OperatingSystemConfig: rendered once from the selected OperatingSystemProfile
//! - Secret: cloud-init payload generated from that config, read by nodes
//!
//! Both objects are immutable and removed, behind a finalizer, when the
//! MachineDeployment is deleted.

mod backoff;
mod config;
mod controller;
mod credentials;
mod error;
mod generator;
mod metrics;
mod profiles;
mod queue;
mod reconcile_helpers;
mod reconciler;
mod resources;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::credentials::SecretRegistryCredentials;
use crate::error::ControllerError;
use crate::generator::CloudInitGenerator;
use crate::metrics::{HttpState, Metrics};
use crate::reconciler::{Reconciler, ReconcilerStores};
use crate::watcher::KubeChangeNotifier;
use cluster_client::{KubeStore, ResourceStore};
use crds::{MachineDeployment, OperatingSystemConfig, OperatingSystemProfile};
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting Operating System Config Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Profile namespace: {}", config.osp_namespace);
    info!("  Workers: {}", config.worker_count);
    info!("  Reconcile timeout: {:?}", config.reconcile_timeout);
    info!("  Container runtime: {}", config.params.container_runtime);
    if let Some(secret) = &config.registry_credentials_secret {
        info!("  Registry credentials: {}", secret);
    }

    let client = Client::try_default().await?;

    let profile_store: Arc<dyn ResourceStore<OperatingSystemProfile>> = Arc::new(KubeStore::new(client.clone()));
    if config.sync_default_profiles {
        if let Err(e) = profiles::sync_default_profiles(&*profile_store, &config.osp_namespace).await {
            warn!("Failed to sync default profiles (will continue): {}", e);
        }
    }

    let secrets: Arc<dyn ResourceStore<Secret>> = Arc::new(KubeStore::new(client.clone()));
    let stores = ReconcilerStores {
        machine_deployments: Arc::new(KubeStore::<MachineDeployment>::new(client.clone())),
        profiles: profile_store,
        configs: Arc::new(KubeStore::<OperatingSystemConfig>::new(client.clone())),
        secrets: Arc::clone(&secrets),
    };
    let mut reconciler = Reconciler::new(
        stores,
        Arc::new(CloudInitGenerator),
        config.params.clone(),
        config.osp_namespace.clone(),
    );
    if let Some(key) = config.registry_credentials_secret.clone() {
        reconciler = reconciler.with_registry_credentials(Arc::new(SecretRegistryCredentials::new(secrets, key)));
    }

    let metrics = Metrics::new()
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to register metrics: {}", e)))?;
    let ready = Arc::new(AtomicBool::new(false));
    let http = tokio::spawn(metrics::serve(
        config.metrics_addr,
        HttpState {
            metrics: metrics.clone(),
            ready: Arc::clone(&ready),
        },
    ));

    let notifier = KubeChangeNotifier::new(client, config.watch_namespace.as_deref());
    let controller = Controller::new(reconciler, metrics, config.worker_count, config.reconcile_timeout);
    ready.store(true, Ordering::SeqCst);

    controller
        .run(notifier, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    http.abort();
    Ok(())
}
