//! Capability traits a discovery backend implements.
//!
//! A backend is plugged into the aggregator as one registry entry. The
//! aggregator depends only on these traits, never on a concrete backend:
//!
//! ```ignore
//! struct ConsulRegistry { /* ... */ }
//!
//! #[async_trait]
//! impl RegistryController for ConsulRegistry { /* run, handlers */ }
//! #[async_trait]
//! impl ServiceDiscovery for ConsulRegistry { /* lookups */ }
//! #[async_trait]
//! impl ServiceAccounts for ConsulRegistry { /* identities */ }
//!
//! // ConsulRegistry is now a `ServiceRegistryBackend`.
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceRegistryError;
use crate::models::{Event, Hostname, LabelsCollection, PortList, Proxy, Service, ServiceInstance};

/// Callback invoked when a service changes.
pub type ServiceHandler = Arc<dyn Fn(&Service, Event) + Send + Sync>;

/// Callback invoked when a service instance changes.
pub type InstanceHandler = Arc<dyn Fn(&ServiceInstance, Event) + Send + Sync>;

/// Lifecycle and change notification capability.
#[async_trait]
pub trait RegistryController: Send + Sync {
    /// Run the backend until `cancel` fires.
    async fn run(&self, cancel: CancellationToken);

    /// Register a callback for service changes.
    ///
    /// # Errors
    ///
    /// - `HandlerRejected` if the backend cannot accept the handler
    fn append_service_handler(&self, handler: ServiceHandler) -> Result<(), ServiceRegistryError>;

    /// Register a callback for instance changes.
    ///
    /// # Errors
    ///
    /// - `HandlerRejected` if the backend cannot accept the handler
    fn append_instance_handler(&self, handler: InstanceHandler)
    -> Result<(), ServiceRegistryError>;
}

/// Service and instance lookup capability.
///
/// "Nothing known" is an empty or absent result, never an error. Errors mean
/// the backend could not answer.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// List every service the backend knows about.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backend cannot be queried
    async fn services(&self) -> Result<Vec<Arc<Service>>, ServiceRegistryError>;

    /// Get a service by hostname.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backend cannot be queried
    async fn get_service(
        &self,
        hostname: &Hostname,
    ) -> Result<Option<Arc<Service>>, ServiceRegistryError>;

    /// Management (health check) ports of the workload at `addr`, if known.
    async fn management_ports(&self, addr: &str) -> Option<PortList>;

    /// Instances of `hostname` on any of the named `ports` whose labels
    /// match `labels`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backend cannot be queried
    async fn instances(
        &self,
        hostname: &Hostname,
        ports: &[String],
        labels: &LabelsCollection,
    ) -> Result<Vec<Arc<ServiceInstance>>, ServiceRegistryError>;

    /// Instances of `hostname` on port number `port` whose labels match `labels`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backend cannot be queried
    async fn instances_by_port(
        &self,
        hostname: &Hostname,
        port: u16,
        labels: &LabelsCollection,
    ) -> Result<Vec<Arc<ServiceInstance>>, ServiceRegistryError>;

    /// Instances co-located with `proxy`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backend cannot be queried
    async fn get_proxy_service_instances(
        &self,
        proxy: &Proxy,
    ) -> Result<Vec<Arc<ServiceInstance>>, ServiceRegistryError>;
}

/// Trust identity capability.
#[async_trait]
pub trait ServiceAccounts: Send + Sync {
    /// Identities (SPIFFE-style service accounts) that may run `hostname`
    /// on the given ports. `None` when the backend does not know the service.
    async fn get_istio_service_accounts(
        &self,
        hostname: &Hostname,
        ports: &[String],
    ) -> Option<Vec<String>>;
}

/// A complete discovery backend: all three capabilities.
pub trait ServiceRegistryBackend: RegistryController + ServiceDiscovery + ServiceAccounts {}

impl<T> ServiceRegistryBackend for T where T: RegistryController + ServiceDiscovery + ServiceAccounts
{}
