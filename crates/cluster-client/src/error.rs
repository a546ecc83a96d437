//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the cluster API
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Kubernetes API error not covered by a more specific variant
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object with the same name already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Object was changed concurrently (resourceVersion precondition failed)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Object is missing name or namespace
    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    /// API is temporarily unavailable
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl ClusterError {
    /// Returns true if the error reports an absent object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the error is an optimistic concurrency failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
