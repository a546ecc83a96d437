//! Unit tests for reconcile_helpers module

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconcile_helpers::*;
    use cluster_client::{ClusterError, MockOperation, MockStore, ObjectKey, ResourceStore};
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn config_map(data: &str, resource_version: Option<&str>) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("test".to_string()),
                namespace: Some("default".to_string()),
                resource_version: resource_version.map(str::to_string),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("key".to_string(), data.to_string())])),
            ..Default::default()
        }
    }

    fn key() -> ObjectKey {
        ObjectKey::new("default", "test")
    }

    #[tokio::test]
    async fn test_ensure_creates_missing_object() {
        let store = MockStore::<ConfigMap>::new();

        let outcome = ensure_named_object(&store, &key(), |_| Ok(config_map("a", None)), UpdateStrategy::InPlace)
            .await
            .unwrap();

        assert_eq!(outcome, EnsureOutcome::Created);
        let stored = store.object(&key()).await.unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_ensure_updates_changed_object() {
        let store = MockStore::<ConfigMap>::new();
        store.insert(config_map("a", Some("0"))).await;

        let outcome = ensure_named_object(
            &store,
            &key(),
            |existing| {
                let mut cm = existing.unwrap_or_default();
                cm.data = Some(BTreeMap::from([("key".to_string(), "b".to_string())]));
                Ok(cm)
            },
            UpdateStrategy::InPlace,
        )
        .await
        .unwrap();

        assert_eq!(outcome, EnsureOutcome::Updated);
        let stored = store.object(&key()).await.unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("1"));
        assert_eq!(stored.data.unwrap()["key"], "b");
    }

    #[tokio::test]
    async fn test_ensure_leaves_equal_object_untouched() {
        let store = MockStore::<ConfigMap>::new();
        store.insert(config_map("a", Some("0"))).await;

        // Desired object has no resourceVersion; still counts as equal
        let outcome = ensure_named_object(&store, &key(), |_| Ok(config_map("a", None)), UpdateStrategy::InPlace)
            .await
            .unwrap();

        assert_eq!(outcome, EnsureOutcome::Unchanged);
        let stored = store.object(&key()).await.unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("0"));
        assert_eq!(store.calls(MockOperation::Update).await, 0);
    }

    #[tokio::test]
    async fn test_ensure_recreate_strategy() {
        let store = MockStore::<ConfigMap>::new();
        store.insert(config_map("a", Some("0"))).await;

        let outcome = ensure_named_object(&store, &key(), |_| Ok(config_map("b", None)), UpdateStrategy::Recreate)
            .await
            .unwrap();

        assert_eq!(outcome, EnsureOutcome::Recreated);
        assert_eq!(store.calls(MockOperation::Delete).await, 1);
        assert_eq!(store.calls(MockOperation::Create).await, 1);
        assert_eq!(store.object(&key()).await.unwrap().data.unwrap()["key"], "b");
    }

    /// Store whose deletes are held back by finalizers: the object stays
    struct FinalizedStore(MockStore<ConfigMap>);

    #[async_trait::async_trait]
    impl ResourceStore<ConfigMap> for FinalizedStore {
        async fn get(&self, key: &ObjectKey) -> Result<Option<ConfigMap>, ClusterError> {
            self.0.get(key).await
        }

        async fn create(&self, obj: &ConfigMap) -> Result<ConfigMap, ClusterError> {
            self.0.create(obj).await
        }

        async fn update(&self, obj: &ConfigMap) -> Result<ConfigMap, ClusterError> {
            self.0.update(obj).await
        }

        async fn delete(&self, _key: &ObjectKey) -> Result<bool, ClusterError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_ensure_recreate_waits_for_pending_delete() {
        let store = FinalizedStore(MockStore::<ConfigMap>::new());
        store.0.insert(config_map("a", Some("0"))).await;

        let result =
            ensure_named_object(&store, &key(), |_| Ok(config_map("b", None)), UpdateStrategy::Recreate).await;

        assert!(matches!(result, Err(ControllerError::Conflict(_))));
        assert!(!result.unwrap_err().is_configuration_error());
        // Old object untouched until the delete completes
        assert_eq!(store.0.object(&key()).await.unwrap().data.unwrap()["key"], "a");
    }

    #[tokio::test]
    async fn test_ensure_propagates_creator_error() {
        let store = MockStore::<ConfigMap>::new();

        let result = ensure_named_object(
            &store,
            &key(),
            |_| Err(ControllerError::InvalidConfig("bad".to_string())),
            UpdateStrategy::InPlace,
        )
        .await;

        assert!(result.is_err());
        assert!(store.objects().await.is_empty());
    }

    #[test]
    fn test_finalizer_helpers() {
        let mut cm = config_map("a", None);
        assert!(!has_finalizer(&cm, CLEANUP_FINALIZER));

        assert!(add_finalizer(&mut cm, CLEANUP_FINALIZER));
        assert!(!add_finalizer(&mut cm, CLEANUP_FINALIZER));
        assert!(has_finalizer(&cm, CLEANUP_FINALIZER));
        assert_eq!(cm.metadata.finalizers.as_ref().unwrap().len(), 1);

        assert!(remove_finalizer(&mut cm, CLEANUP_FINALIZER));
        assert!(!remove_finalizer(&mut cm, CLEANUP_FINALIZER));
        assert!(!has_finalizer(&cm, CLEANUP_FINALIZER));
    }
}
