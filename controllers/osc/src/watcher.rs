//! MachineDeployment change notification.
//!
//! A [`ChangeNotifier`] yields the keys of MachineDeployments that may need
//! reconciling. Delivery is level-triggered and at-least-once: the same key
//! can arrive many times and the reconciler works from a fresh read anyway.

use crate::error::ControllerError;
use crate::reconcile_helpers::{CLEANUP_FINALIZER, has_finalizer};
use crate::resources::profile_name;
use cluster_client::ObjectKey;
use crds::MachineDeployment;
use futures::StreamExt;
use futures::stream::BoxStream;
use kube::{Api, Client};
use kube_runtime::{WatchStreamExt, watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Source of MachineDeployment keys to reconcile.
#[async_trait::async_trait]
pub trait ChangeNotifier: Send {
    /// Next key; `None` when the source is closed.
    async fn next_key(&mut self) -> Option<Result<ObjectKey, ControllerError>>;
}

/// Whether a MachineDeployment concerns this controller: it selects a
/// profile, or it still carries our finalizer and needs cleanup.
pub fn should_enqueue(md: &MachineDeployment) -> bool {
    profile_name(md).is_some() || has_finalizer(md, CLEANUP_FINALIZER)
}

/// Watches MachineDeployments through the Kubernetes API.
pub struct KubeChangeNotifier {
    stream: BoxStream<'static, Result<MachineDeployment, watcher::Error>>,
}

impl std::fmt::Debug for KubeChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeChangeNotifier").finish_non_exhaustive()
    }
}

impl KubeChangeNotifier {
    /// Watches one namespace, or all namespaces when `namespace` is `None`.
    pub fn new(client: Client, namespace: Option<&str>) -> Self {
        let api: Api<MachineDeployment> = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        info!("Starting MachineDeployment watcher ({})", namespace.unwrap_or("all namespaces"));

        // Reconnects with backoff; deleted objects are delivered too
        let stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .touched_objects()
            .boxed();
        Self { stream }
    }
}

#[async_trait::async_trait]
impl ChangeNotifier for KubeChangeNotifier {
    async fn next_key(&mut self) -> Option<Result<ObjectKey, ControllerError>> {
        loop {
            match self.stream.next().await? {
                Ok(md) => {
                    if !should_enqueue(&md) {
                        continue;
                    }
                    if let Some(key) = ObjectKey::from_resource(&md) {
                        debug!("MachineDeployment {} changed", key);
                        return Some(Ok(key));
                    }
                }
                Err(e) => return Some(Err(ControllerError::Watch(e.to_string()))),
            }
        }
    }
}

/// Notifier fed from a channel.
#[derive(Debug)]
pub struct ChannelNotifier {
    rx: mpsc::Receiver<ObjectKey>,
}

impl ChannelNotifier {
    /// Creates a notifier and the sender feeding it.
    pub fn new(buffer: usize) -> (mpsc::Sender<ObjectKey>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait::async_trait]
impl ChangeNotifier for ChannelNotifier {
    async fn next_key(&mut self) -> Option<Result<ObjectKey, ControllerError>> {
        self.rx.recv().await.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{deleting, finalized, machine_deployment};

    #[test]
    fn test_should_enqueue() {
        assert!(should_enqueue(&machine_deployment("md-1", "ns-a", Some("ubuntu-22-04"))));
        assert!(!should_enqueue(&machine_deployment("md-1", "ns-a", None)));
        assert!(!should_enqueue(&machine_deployment("md-1", "ns-a", Some(""))));

        // Annotation removed, but cleanup still pending
        assert!(should_enqueue(&deleting(finalized(machine_deployment("md-1", "ns-a", None)))));
    }

    #[tokio::test]
    async fn test_channel_notifier() {
        let (tx, mut notifier) = ChannelNotifier::new(4);
        tx.send(ObjectKey::new("ns-a", "md-1")).await.unwrap();
        drop(tx);

        let key = notifier.next_key().await.unwrap().unwrap();
        assert_eq!(key, ObjectKey::new("ns-a", "md-1"));
        assert!(notifier.next_key().await.is_none());
    }
}
