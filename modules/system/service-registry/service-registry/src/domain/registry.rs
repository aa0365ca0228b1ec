//! Registry entries and the ordered store that holds them.

use std::sync::Arc;

use parking_lot::Mutex;
use service_registry_sdk::{ClusterId, RegistryKind, ServiceRegistryBackend};

use super::DomainError;

/// One discovery backend plugged into the aggregator, tagged with the
/// cluster it represents.
#[derive(Clone)]
pub struct Registry {
    /// Platform kind, informational only.
    pub name: RegistryKind,
    pub cluster_id: ClusterId,
    pub backend: Arc<dyn ServiceRegistryBackend>,
}

impl Registry {
    #[must_use]
    pub fn new(
        name: RegistryKind,
        cluster_id: impl Into<ClusterId>,
        backend: Arc<dyn ServiceRegistryBackend>,
    ) -> Self {
        Self {
            name,
            cluster_id: cluster_id.into(),
            backend,
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("cluster_id", &self.cluster_id)
            .finish_non_exhaustive()
    }
}

/// Ordered, lock-protected list of registries.
///
/// Reads and writes share one exclusive lock. Every mutation installs a
/// freshly built sequence, so a snapshot handed out earlier never changes
/// length or order underneath its holder.
pub struct RegistryStore {
    registries: Mutex<Arc<[Registry]>>,
    unique_cluster_ids: bool,
}

impl std::fmt::Debug for RegistryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clusters: Vec<ClusterId> = self
            .snapshot()
            .iter()
            .map(|r| r.cluster_id.clone())
            .collect();
        f.debug_struct("RegistryStore")
            .field("clusters", &clusters)
            .field("unique_cluster_ids", &self.unique_cluster_ids)
            .finish()
    }
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl RegistryStore {
    /// Create an empty store. With `unique_cluster_ids` set, `add` refuses a
    /// second registry for an already registered (non-empty) cluster id.
    #[must_use]
    pub fn new(unique_cluster_ids: bool) -> Self {
        Self {
            registries: Mutex::new(Arc::from(Vec::new())),
            unique_cluster_ids,
        }
    }

    /// Append a registry at the end of the iteration order.
    ///
    /// # Errors
    /// Returns `DomainError::DuplicateCluster` when uniqueness is enforced and
    /// the cluster id is already present.
    pub fn add(&self, registry: Registry) -> Result<(), DomainError> {
        let mut guard = self.registries.lock();

        if self.unique_cluster_ids
            && !registry.cluster_id.is_empty()
            && position(&guard, &registry.cluster_id).is_some()
        {
            return Err(DomainError::DuplicateCluster(registry.cluster_id));
        }

        tracing::info!(
            cluster_id = %registry.cluster_id,
            registry = %registry.name,
            "Registry added"
        );

        let mut next = guard.to_vec();
        next.push(registry);
        *guard = Arc::from(next);
        Ok(())
    }

    /// Remove the first registry for `cluster_id`, keeping the order of the
    /// rest. Unknown ids are a no-op. Returns whether anything was removed.
    pub fn delete(&self, cluster_id: &str) -> bool {
        let mut guard = self.registries.lock();

        if guard.is_empty() {
            tracing::warn!("Registry list is empty, nothing to delete");
            return false;
        }

        let Some(index) = position(&guard, cluster_id) else {
            tracing::warn!(
                cluster_id = cluster_id,
                "Registry is not found in the registries list, nothing to delete"
            );
            return false;
        };

        let mut next = guard.to_vec();
        next.remove(index);
        *guard = Arc::from(next);

        tracing::info!(cluster_id = cluster_id, "Registry for the cluster has been deleted");
        true
    }

    /// Current registries in iteration order.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[Registry]> {
        Arc::clone(&self.registries.lock())
    }

    /// Position of the first registry for `cluster_id`.
    #[must_use]
    pub fn index_of(&self, cluster_id: &str) -> Option<usize> {
        position(&self.registries.lock(), cluster_id)
    }

    #[must_use]
    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        self.snapshot()
            .iter()
            .map(|r| r.cluster_id.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registries.lock().is_empty()
    }
}

fn position(registries: &[Registry], cluster_id: &str) -> Option<usize> {
    registries.iter().position(|r| r.cluster_id == cluster_id)
}
