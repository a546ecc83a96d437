//! Main controller implementation.
//!
//! The `Controller` feeds keys from a [`ChangeNotifier`] into the work queue
//! and runs a fixed pool of workers that reconcile them. Every reconciliation
//! runs under a deadline; failures are retried with per-key backoff.

use crate::error::ControllerError;
use crate::metrics::{Metrics, ReconcileResult};
use crate::queue::WorkQueue;
use crate::reconciler::Reconciler;
use crate::watcher::ChangeNotifier;
use cluster_client::ObjectKey;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Smallest retry delay of a failed key
const RETRY_MIN: Duration = Duration::from_secs(1);
/// Largest retry delay of a failed key
const RETRY_MAX: Duration = Duration::from_secs(300);

/// Main controller for MachineDeployment provisioning.
pub struct Controller {
    reconciler: Arc<Reconciler>,
    queue: Arc<WorkQueue<ObjectKey>>,
    metrics: Metrics,
    worker_count: usize,
    reconcile_timeout: Duration,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("worker_count", &self.worker_count)
            .field("reconcile_timeout", &self.reconcile_timeout)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a new controller instance.
    pub fn new(reconciler: Reconciler, metrics: Metrics, worker_count: usize, reconcile_timeout: Duration) -> Self {
        Self::with_queue(
            reconciler,
            Arc::new(WorkQueue::new(RETRY_MIN, RETRY_MAX)),
            metrics,
            worker_count,
            reconcile_timeout,
        )
    }

    /// Creates a controller using the given queue.
    pub fn with_queue(
        reconciler: Reconciler,
        queue: Arc<WorkQueue<ObjectKey>>,
        metrics: Metrics,
        worker_count: usize,
        reconcile_timeout: Duration,
    ) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            queue,
            metrics,
            worker_count: worker_count.max(1),
            reconcile_timeout,
        }
    }

    /// Runs until `shutdown` resolves or the notifier closes.
    ///
    /// Workers finish the key they are processing before returning.
    pub async fn run<N, S>(self, mut notifier: N, shutdown: S) -> Result<(), ControllerError>
    where
        N: ChangeNotifier,
        S: Future<Output = ()>,
    {
        info!("Starting {} reconciliation workers", self.worker_count);
        let workers: Vec<JoinHandle<()>> = (0..self.worker_count)
            .map(|id| {
                let worker = Worker {
                    id,
                    reconciler: Arc::clone(&self.reconciler),
                    queue: Arc::clone(&self.queue),
                    metrics: self.metrics.clone(),
                    timeout: self.reconcile_timeout,
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                key = notifier.next_key() => match key {
                    Some(Ok(key)) => {
                        self.queue.add(key);
                        self.metrics.set_queue_depth(self.queue.len());
                    }
                    // The watch stream retries on its own; keep consuming
                    Some(Err(e)) => warn!("MachineDeployment watch error: {}", e),
                    None => {
                        info!("Change notifier closed");
                        break;
                    }
                },
            }
        }

        self.queue.shutdown();
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker task failed: {}", e);
            }
        }
        info!("Controller stopped");
        Ok(())
    }
}

struct Worker {
    id: usize,
    reconciler: Arc<Reconciler>,
    queue: Arc<WorkQueue<ObjectKey>>,
    metrics: Metrics,
    timeout: Duration,
}

impl Worker {
    async fn run(self) {
        debug!("Worker {} started", self.id);
        while let Some(key) = self.queue.get().await {
            self.process(&key).await;
            self.queue.done(&key);
            self.metrics.set_queue_depth(self.queue.len());
        }
        debug!("Worker {} stopped", self.id);
    }

    async fn process(&self, key: &ObjectKey) {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.reconciler.reconcile(key)).await {
            Ok(result) => result,
            Err(_) => Err(ControllerError::Timeout(key.to_string())),
        };

        match result {
            Ok(outcome) => {
                self.metrics.observe_reconcile(ReconcileResult::Success, started.elapsed());
                self.queue.forget(key);
                debug!("Reconciled MachineDeployment {}: {:?}", key, outcome);
            }
            Err(e) if e.is_configuration_error() => {
                self.metrics.observe_reconcile(ReconcileResult::ConfigurationError, started.elapsed());
                let delay = self.queue.add_rate_limited(key.clone());
                warn!("MachineDeployment {} is misconfigured: {} (retrying in {:?})", key, e, delay);
            }
            Err(e) => {
                let result = match e {
                    ControllerError::Timeout(_) => ReconcileResult::Timeout,
                    _ => ReconcileResult::Error,
                };
                self.metrics.observe_reconcile(result, started.elapsed());
                let delay = self.queue.add_rate_limited(key.clone());
                error!("Failed to reconcile MachineDeployment {}: {} (retrying in {:?})", key, e, delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile_helpers::{CLEANUP_FINALIZER, has_finalizer};
    use crate::resources::secret::CLOUD_INIT_NAMESPACE;
    use crate::test_utils::*;
    use crate::watcher::ChannelNotifier;

    const WAIT: Duration = Duration::from_secs(5);

    async fn wait_for<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        tokio::time::timeout(WAIT, async {
            while !condition().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    fn controller(env: TestEnv, metrics: Metrics) -> Controller {
        let queue = Arc::new(WorkQueue::new(Duration::from_millis(10), Duration::from_millis(50)));
        Controller::with_queue(env.reconciler, queue, metrics, 2, WAIT)
    }

    #[tokio::test]
    async fn test_run_provisions_delivered_keys() {
        let env = TestEnv::new();
        env.profiles.insert(profile("ubuntu-22-04", PROFILE_NAMESPACE)).await;
        env.machine_deployments.insert(machine_deployment("md-1", "ns-a", Some("ubuntu-22-04"))).await;
        env.machine_deployments.insert(machine_deployment("md-2", "ns-b", Some("ubuntu-22-04"))).await;
        let (mds, secrets) = (env.machine_deployments.clone(), env.secrets.clone());
        let metrics = Metrics::new().unwrap();

        let (tx, notifier) = ChannelNotifier::new(8);
        let handle = tokio::spawn(controller(env, metrics.clone()).run(notifier, std::future::pending()));

        tx.send(ObjectKey::new("ns-a", "md-1")).await.unwrap();
        tx.send(ObjectKey::new("ns-b", "md-2")).await.unwrap();
        tx.send(ObjectKey::new("ns-a", "md-1")).await.unwrap();

        wait_for(|| {
            let secrets = secrets.clone();
            async move { secrets.objects().await.len() == 2 }
        })
        .await;
        let md = mds.object(&ObjectKey::new("ns-a", "md-1")).await.unwrap();
        assert!(has_finalizer(&md, CLEANUP_FINALIZER));
        assert!(
            secrets
                .object(&ObjectKey::new(CLOUD_INIT_NAMESPACE, "md-2-ns-b-provisioning"))
                .await
                .is_some()
        );

        // Closing the notifier stops the controller
        drop(tx);
        tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
        assert!(metrics.reconciliations(ReconcileResult::Success) >= 2);
    }

    #[tokio::test]
    async fn test_failed_keys_are_retried() {
        let env = TestEnv::new();
        env.machine_deployments.insert(machine_deployment("md-1", "ns-a", Some("ubuntu-22-04"))).await;
        let (profiles, secrets) = (env.profiles.clone(), env.secrets.clone());
        let metrics = Metrics::new().unwrap();

        let (tx, notifier) = ChannelNotifier::new(8);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(controller(env, metrics.clone()).run(notifier, async {
            let _ = stop_rx.await;
        }));

        // Profile missing: fails until it shows up, no new delivery needed
        tx.send(ObjectKey::new("ns-a", "md-1")).await.unwrap();
        wait_for(|| {
            let metrics = metrics.clone();
            async move { metrics.reconciliations(ReconcileResult::ConfigurationError) >= 1 }
        })
        .await;
        profiles.insert(profile("ubuntu-22-04", PROFILE_NAMESPACE)).await;

        wait_for(|| {
            let secrets = secrets.clone();
            async move { secrets.objects().await.len() == 1 }
        })
        .await;

        stop_tx.send(()).unwrap();
        tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
    }
}
