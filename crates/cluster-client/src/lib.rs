//! Typed Kubernetes object stores
//!
//! Every kind the controller touches is accessed through a small capability
//! interface, [`ResourceStore`], typed to that kind. Production code uses
//! [`KubeStore`], an adapter over `kube::Api`; unit tests use the in-memory
//! `MockStore` (feature `test-util`).
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{KubeStore, ObjectKey, ResourceStore};
//! use k8s_openapi::api::core::v1::Secret;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let secrets: KubeStore<Secret> = KubeStore::new(client);
//!
//! // Existence check: `None` means the object is absent
//! let key = ObjectKey::new("cloud-init-settings", "md-1-ns-a-provisioning");
//! if secrets.get(&key).await?.is_none() {
//!     println!("{} not provisioned yet", key);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod key;
pub mod kube_store;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use error::ClusterError;
pub use key::ObjectKey;
pub use kube_store::KubeStore;
pub use store_trait::ResourceStore;
#[cfg(feature = "test-util")]
pub use mock::{MockOperation, MockStore};
