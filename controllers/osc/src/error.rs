//! Controller-specific error types.
//!
//! This module defines error types specific to the Operating System Config
//! Controller that are not covered by upstream library errors.

use cluster_client::ClusterError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Operating System Config Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client setup error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cluster API call failed
    #[error("{context}: {source}")]
    Cluster {
        /// What was being done
        context: String,
        /// Underlying store error
        #[source]
        source: ClusterError,
    },

    /// Object changed concurrently, retry from a fresh read
    #[error("Conflict: {0}")]
    Conflict(String),

    /// MachineDeployment has no (or an empty) profile annotation
    #[error("MachineDeployment {0} has no operating system profile annotation")]
    MissingProfileAnnotation(String),

    /// Referenced OperatingSystemProfile does not exist
    #[error("OperatingSystemProfile {0} not found")]
    ProfileNotFound(String),

    /// Profile does not support the MachineDeployment's cloud provider
    #[error("OperatingSystemProfile {profile} does not support cloud provider {provider:?}")]
    UnsupportedCloudProvider {
        /// Profile key
        profile: String,
        /// Cloud provider of the MachineDeployment
        provider: String,
    },

    /// Profile content cannot be rendered for the given parameters
    #[error("Invalid OperatingSystemProfile {profile}: {reason}")]
    InvalidProfile {
        /// Profile key
        profile: String,
        /// What went wrong
        reason: String,
    },

    /// MachineDeployment provider spec cannot be interpreted
    #[error("Invalid provider spec for MachineDeployment {machine_deployment}: {reason}")]
    InvalidProviderSpec {
        /// MachineDeployment key
        machine_deployment: String,
        /// What went wrong
        reason: String,
    },

    /// A derived object with the computed name belongs to another MachineDeployment
    #[error("{kind} {name} belongs to MachineDeployment {owner}, not {machine_deployment}")]
    NameCollision {
        /// Kind of the derived object
        kind: &'static str,
        /// Derived object key
        name: String,
        /// Owner recorded on the existing object
        owner: String,
        /// MachineDeployment being reconciled
        machine_deployment: String,
    },

    /// A derived object that must exist at this step is missing
    #[error("{0} not found")]
    DerivedObjectMissing(String),

    /// Provisioning data generation failed
    #[error("failed to generate provisioning data for {name}: {source}")]
    Generation {
        /// OperatingSystemConfig key
        name: String,
        /// Generator error
        #[source]
        source: crate::generator::GeneratorError,
    },

    /// Provider cloud-config rendering failed
    #[error("failed to render cloud config: {0}")]
    Render(#[from] cloud_config::RenderError),

    /// Registry credentials secret could not be read
    #[error("failed to get registry credentials: {0}")]
    Credentials(String),

    /// Object could not be converted for comparison
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reconciliation exceeded its deadline
    #[error("Reconciliation of {0} timed out")]
    Timeout(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Wraps a store error with context. Optimistic concurrency failures are
    /// surfaced as [`ControllerError::Conflict`].
    pub fn cluster(context: impl Into<String>, source: ClusterError) -> Self {
        let context = context.into();
        if source.is_conflict() {
            return Self::Conflict(format!("{}: {}", context, source));
        }
        Self::Cluster { context, source }
    }

    /// Errors that repeat on every retry until someone fixes the
    /// MachineDeployment or the profile.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingProfileAnnotation(_)
                | Self::ProfileNotFound(_)
                | Self::UnsupportedCloudProvider { .. }
                | Self::InvalidProfile { .. }
                | Self::InvalidProviderSpec { .. }
                | Self::NameCollision { .. }
                | Self::Render(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_are_not_wrapped() {
        let err = ControllerError::cluster(
            "failed to add finalizer to ns-a/md-1",
            ClusterError::Conflict("MachineDeployment ns-a/md-1".to_string()),
        );
        assert!(matches!(err, ControllerError::Conflict(_)));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(ControllerError::MissingProfileAnnotation("ns-a/md-1".to_string()).is_configuration_error());
        assert!(ControllerError::ProfileNotFound("kube-system/osp".to_string()).is_configuration_error());
        assert!(
            !ControllerError::cluster("get", ClusterError::Unavailable("down".to_string())).is_configuration_error()
        );
        assert!(!ControllerError::Timeout("ns-a/md-1".to_string()).is_configuration_error());
    }
}
