//! Bundled default OperatingSystemProfiles.
//!
//! Installed into the profile namespace at startup. Unlike derived objects,
//! profiles are mutable: a bundled profile replaces the stored one whenever
//! its `spec.version` differs.

use crate::error::ControllerError;
use crate::reconcile_helpers::{EnsureOutcome, UpdateStrategy, ensure_named_object};
use cluster_client::{ObjectKey, ResourceStore};
use crds::OperatingSystemProfile;
use tracing::info;

/// Bundled profile manifests
const DEFAULT_PROFILES: &[(&str, &str)] = &[("osp-ubuntu.yaml", include_str!("../profiles/osp-ubuntu.yaml"))];

/// Parses the bundled profiles.
pub fn default_profiles() -> Result<Vec<OperatingSystemProfile>, ControllerError> {
    DEFAULT_PROFILES
        .iter()
        .map(|(file, manifest)| {
            serde_yaml::from_str(manifest)
                .map_err(|e| ControllerError::InvalidConfig(format!("invalid bundled profile {}: {}", file, e)))
        })
        .collect()
}

/// Installs or upgrades the bundled profiles in `namespace`.
pub async fn sync_default_profiles(
    store: &dyn ResourceStore<OperatingSystemProfile>,
    namespace: &str,
) -> Result<Vec<(ObjectKey, EnsureOutcome)>, ControllerError> {
    let mut results = Vec::new();
    for profile in default_profiles()? {
        let name = profile
            .metadata
            .name
            .clone()
            .ok_or_else(|| ControllerError::InvalidConfig("bundled profile without a name".to_string()))?;
        let key = ObjectKey::new(namespace, name);
        let version = profile.spec.version.clone();

        let outcome = ensure_named_object(
            store,
            &key,
            |existing| match existing {
                // Same version: keep whatever is stored, including local edits
                Some(existing) if existing.spec.version == profile.spec.version => Ok(existing),
                _ => Ok(profile),
            },
            UpdateStrategy::InPlace,
        )
        .await?;
        info!("Default OperatingSystemProfile {} ({}): {:?}", key, version, outcome);
        results.push((key, outcome));
    }
    Ok(results)
}
