//! Provider Cloud Config
//!
//! Renders provider cloud configuration into the line-oriented `gcfg` format
//! read by the kubelet and the cloud controller manager.
//!
//! # Example
//!
//! ```
//! use cloud_config::{CloudConfig, GlobalOpts};
//!
//! let config = CloudConfig {
//!     global: GlobalOpts {
//!         project_id: "my-project".to_string(),
//!         node_tags: vec!["worker".to_string()],
//!         ..Default::default()
//!     },
//! };
//! let rendered = config.render().unwrap();
//! assert!(rendered.contains("project-id = my-project\n"));
//! assert!(rendered.contains("node-tags = worker\n"));
//! ```

pub mod error;
pub mod gce;
pub mod ini;

pub use error::RenderError;
pub use gce::{CloudConfig, GlobalOpts};
