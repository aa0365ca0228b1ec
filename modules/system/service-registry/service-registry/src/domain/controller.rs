//! Aggregate controller: fans every query out over the registered backends.
//!
//! Backends are always visited in store order. Precedence per operation:
//!
//! | operation                      | result                          | errors surface when |
//! |--------------------------------|---------------------------------|---------------------|
//! | `services`                     | merged by hostname              | always returned     |
//! | `get_service`                  | first backend with a service    | nothing found       |
//! | `instances`/`instances_by_port`| union of all backends           | nothing found       |
//! | `get_proxy_service_instances`  | first non-empty, tags the proxy | nothing found       |
//! | `management_ports`             | first backend with ports        | never               |
//! | `get_istio_service_accounts`   | first backend with accounts     | never               |
//!
//! Errors that are dropped because another backend answered are logged.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use service_registry_sdk::{
    ClusterId, Hostname, InstanceHandler, LabelsCollection, PortList, Proxy, RegistryController,
    Service, ServiceAccounts, ServiceHandler, ServiceInstance, ServiceRegistryError,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::merge::ServiceMerger;
use super::{CompositeError, DomainError, ErrorAccumulator, Registry, RegistryStore};
use crate::config::AggregateConfig;

/// Result of listing services across all registries.
///
/// Partial data and the failures of the registries that could not be listed
/// are returned together; a failure never hides what the other registries
/// reported.
#[derive(Debug, Default)]
pub struct ServiceListing {
    /// One merged service per hostname, in first-seen order.
    pub services: Vec<Arc<Service>>,
    /// Failures of individual registries, if any.
    pub errors: Option<CompositeError>,
}

impl ServiceListing {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.errors.is_some()
    }

    /// Strict view: any registry failure fails the listing.
    ///
    /// # Errors
    /// Returns the composite error if any registry failed.
    pub fn into_result(self) -> Result<Vec<Arc<Service>>, CompositeError> {
        match self.errors {
            Some(errors) => Err(errors),
            None => Ok(self.services),
        }
    }
}

/// Aggregates data across registries and dispatches their lifecycle.
///
/// Lifecycle, handler registration and trust identities go through the
/// [`RegistryController`] and [`ServiceAccounts`] impls. Discovery queries are
/// inherent methods: they return composite errors and partial listings, and
/// the proxy lookup records the owning cluster on the proxy, so the aggregate
/// does not implement `ServiceDiscovery`.
#[derive(Debug)]
pub struct AggregateController {
    store: RegistryStore,
    config: AggregateConfig,
}

impl Default for AggregateController {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateController {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AggregateConfig::default())
    }

    #[must_use]
    pub fn with_config(config: AggregateConfig) -> Self {
        Self {
            store: RegistryStore::new(config.unique_cluster_ids),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    /// Add a registry after all registries added so far.
    ///
    /// # Errors
    /// Returns `DomainError::DuplicateCluster` only when `unique_cluster_ids`
    /// is enabled and the cluster is already registered.
    pub fn add_registry(&self, registry: Registry) -> Result<(), DomainError> {
        self.store.add(registry)
    }

    /// Delete the registry for `cluster_id`. Deleting an unknown cluster is a
    /// successful no-op; the return value tells whether a registry was removed.
    pub fn delete_registry(&self, cluster_id: &str) -> bool {
        self.store.delete(cluster_id)
    }

    /// Snapshot of the registries in iteration order.
    #[must_use]
    pub fn registries(&self) -> Arc<[Registry]> {
        self.store.snapshot()
    }

    #[must_use]
    pub fn registry_index(&self, cluster_id: &str) -> Option<usize> {
        self.store.index_of(cluster_id)
    }

    #[must_use]
    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        self.store.cluster_ids()
    }

    /// List services from all registries, one per hostname.
    ///
    /// The first registry to report a hostname supplies every field but the
    /// per-cluster `addresses`, which collect the address reported by each
    /// registry that has a cluster id.
    pub async fn services(&self) -> ServiceListing {
        let mut merger = ServiceMerger::new();
        let mut errors = ErrorAccumulator::new();

        for registry in self.store.snapshot().iter() {
            match registry.backend.services().await {
                Ok(services) => merger.merge(&registry.cluster_id, &services),
                Err(e) => record_failure(&mut errors, "services", registry, e),
            }
        }

        ServiceListing {
            services: merger.finish(),
            errors: errors.finish(),
        }
    }

    /// Get a service by hostname from the first registry that has it.
    ///
    /// # Errors
    /// Returns the composite error when no registry has the service and at
    /// least one registry failed.
    pub async fn get_service(
        &self,
        hostname: &Hostname,
    ) -> Result<Option<Arc<Service>>, CompositeError> {
        let mut errors = ErrorAccumulator::new();

        for registry in self.store.snapshot().iter() {
            match registry.backend.get_service(hostname).await {
                Ok(Some(service)) => {
                    log_discarded("get_service", errors);
                    return Ok(Some(service));
                }
                Ok(None) => {}
                Err(e) => record_failure(&mut errors, "get_service", registry, e),
            }
        }

        errors.finish().map_or(Ok(None), Err)
    }

    /// Management ports of the workload at `addr`, from the first registry
    /// that knows it.
    pub async fn management_ports(&self, addr: &str) -> Option<PortList> {
        for registry in self.store.snapshot().iter() {
            if let Some(ports) = registry.backend.management_ports(addr).await {
                return Some(ports);
            }
        }
        None
    }

    /// Instances of `hostname` on the named ports matching `labels`, unioned
    /// across registries. An empty label collection matches everything.
    ///
    /// # Errors
    /// Returns the composite error when no registry reported an instance and
    /// at least one registry failed.
    pub async fn instances(
        &self,
        hostname: &Hostname,
        ports: &[String],
        labels: &LabelsCollection,
    ) -> Result<Vec<Arc<ServiceInstance>>, CompositeError> {
        let mut union = InstanceUnion::new("instances");
        for registry in self.store.snapshot().iter() {
            let found = registry.backend.instances(hostname, ports, labels).await;
            union.record(registry, found);
        }
        union.finish()
    }

    /// Like [`Self::instances`], selecting the service port by number.
    ///
    /// # Errors
    /// Returns the composite error when no registry reported an instance and
    /// at least one registry failed.
    pub async fn instances_by_port(
        &self,
        hostname: &Hostname,
        port: u16,
        labels: &LabelsCollection,
    ) -> Result<Vec<Arc<ServiceInstance>>, CompositeError> {
        let mut union = InstanceUnion::new("instances_by_port");
        for registry in self.store.snapshot().iter() {
            let found = registry
                .backend
                .instances_by_port(hostname, port, labels)
                .await;
            union.record(registry, found);
        }
        union.finish()
    }

    /// Instances co-located with `proxy`, from the first registry that
    /// reports any. That registry's cluster id is recorded on the proxy.
    ///
    /// # Errors
    /// Returns the composite error when no registry claimed the proxy and at
    /// least one registry failed.
    pub async fn get_proxy_service_instances(
        &self,
        proxy: &mut Proxy,
    ) -> Result<Vec<Arc<ServiceInstance>>, CompositeError> {
        let mut errors = ErrorAccumulator::new();

        // A proxy is expected to live in exactly one registry.
        for registry in self.store.snapshot().iter() {
            match registry.backend.get_proxy_service_instances(proxy).await {
                Ok(instances) if !instances.is_empty() => {
                    proxy.cluster_id.clone_from(&registry.cluster_id);
                    log_discarded("get_proxy_service_instances", errors);
                    return Ok(instances);
                }
                Ok(_) => {}
                Err(e) => record_failure(&mut errors, "get_proxy_service_instances", registry, e),
            }
        }

        errors.finish().map_or_else(|| Ok(Vec::new()), Err)
    }

    async fn join_workers(&self, workers: Vec<(ClusterId, JoinHandle<()>)>) {
        let (clusters, handles): (Vec<_>, Vec<_>) = workers.into_iter().unzip();

        match tokio::time::timeout(self.config.worker_join_timeout, join_all(handles)).await {
            Ok(results) => {
                for (cluster_id, result) in clusters.iter().zip(results) {
                    if let Err(e) = result {
                        tracing::warn!(
                            cluster_id = %cluster_id,
                            error = %e,
                            "Registry worker ended abnormally"
                        );
                    }
                }
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.config.worker_join_timeout,
                    workers = clusters.len(),
                    "Registry workers did not stop before the join deadline"
                );
            }
        }
    }
}

#[async_trait]
impl RegistryController for AggregateController {
    /// Start every registry as its own task sharing `cancel`, then wait for
    /// `cancel` to fire.
    ///
    /// Workers are not awaited unless `join_workers_on_stop` is set; each
    /// backend owns its shutdown.
    async fn run(&self, cancel: CancellationToken) {
        let workers: Vec<(ClusterId, JoinHandle<()>)> = self
            .store
            .snapshot()
            .iter()
            .map(|registry| {
                let backend = Arc::clone(&registry.backend);
                let token = cancel.clone();
                tracing::debug!(
                    cluster_id = %registry.cluster_id,
                    registry = %registry.name,
                    "Starting registry worker"
                );
                let handle = tokio::spawn(async move { backend.run(token).await });
                (registry.cluster_id.clone(), handle)
            })
            .collect();

        cancel.cancelled().await;

        if self.config.join_workers_on_stop {
            self.join_workers(workers).await;
        }

        tracing::info!("Registry aggregator terminated");
    }

    /// Register `handler` with every registry in order.
    ///
    /// Stops at the first rejection and returns it. Registries earlier in the
    /// order keep the handler; nothing is rolled back.
    fn append_service_handler(&self, handler: ServiceHandler) -> Result<(), ServiceRegistryError> {
        for registry in self.store.snapshot().iter() {
            if let Err(e) = registry.backend.append_service_handler(Arc::clone(&handler)) {
                tracing::info!(
                    registry = %registry.name,
                    cluster_id = %registry.cluster_id,
                    error = %e,
                    "Failed to append service handler to registry"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Same contract as `append_service_handler`.
    fn append_instance_handler(
        &self,
        handler: InstanceHandler,
    ) -> Result<(), ServiceRegistryError> {
        for registry in self.store.snapshot().iter() {
            if let Err(e) = registry.backend.append_instance_handler(Arc::clone(&handler)) {
                tracing::info!(
                    registry = %registry.name,
                    cluster_id = %registry.cluster_id,
                    error = %e,
                    "Failed to append instance handler to registry"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceAccounts for AggregateController {
    async fn get_istio_service_accounts(
        &self,
        hostname: &Hostname,
        ports: &[String],
    ) -> Option<Vec<String>> {
        for registry in self.store.snapshot().iter() {
            if let Some(accounts) = registry
                .backend
                .get_istio_service_accounts(hostname, ports)
                .await
            {
                return Some(accounts);
            }
        }
        None
    }
}

/// Union of instance lookups across registries.
struct InstanceUnion {
    operation: &'static str,
    instances: Vec<Arc<ServiceInstance>>,
    errors: ErrorAccumulator,
}

impl InstanceUnion {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            instances: Vec::new(),
            errors: ErrorAccumulator::new(),
        }
    }

    fn record(
        &mut self,
        registry: &Registry,
        found: Result<Vec<Arc<ServiceInstance>>, ServiceRegistryError>,
    ) {
        match found {
            Ok(instances) => self.instances.extend(instances),
            Err(e) => record_failure(&mut self.errors, self.operation, registry, e),
        }
    }

    fn finish(self) -> Result<Vec<Arc<ServiceInstance>>, CompositeError> {
        let Self {
            operation,
            instances,
            errors,
        } = self;

        match errors.finish() {
            Some(errors) if instances.is_empty() => Err(errors),
            Some(errors) => {
                tracing::warn!(
                    operation,
                    error = %errors,
                    "Found match but encountered an error"
                );
                Ok(instances)
            }
            None => Ok(instances),
        }
    }
}

fn record_failure(
    errors: &mut ErrorAccumulator,
    operation: &'static str,
    registry: &Registry,
    err: ServiceRegistryError,
) {
    tracing::debug!(
        operation,
        cluster_id = %registry.cluster_id,
        registry = %registry.name,
        error = %err,
        "Registry query failed"
    );
    errors.push(err);
}

fn log_discarded(operation: &'static str, errors: ErrorAccumulator) {
    if let Some(errors) = errors.finish() {
        tracing::warn!(
            operation,
            error = %errors,
            "Found match but encountered an error"
        );
    }
}
