//! Node provisioning CRD definitions
//!
//! Kubernetes Custom Resource Definitions read and written by the
//! operating system config controller.
//!
//! - `MachineDeployment`: machine groups owned by the cluster API (read-only here)
//! - `OperatingSystemProfile`: templates describing how to provision an OS
//! - `OperatingSystemConfig`: rendered, immutable configuration for one group

pub mod machine_deployment;
pub mod operating_system_config;
pub mod operating_system_profile;

pub use machine_deployment::*;
pub use operating_system_config::*;
pub use operating_system_profile::*;
