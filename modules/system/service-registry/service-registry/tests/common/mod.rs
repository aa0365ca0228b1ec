#![allow(dead_code)]

//! In-memory discovery backend used by the aggregator tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use service_registry::Registry;
use service_registry_sdk::{
    Hostname, InstanceHandler, LabelsCollection, NetworkEndpoint, Port, PortList, Protocol, Proxy,
    RegistryController, RegistryKind, Service, ServiceAccounts, ServiceDiscovery, ServiceHandler,
    ServiceInstance, ServiceRegistryError,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

type Lookup<T> = Result<T, ServiceRegistryError>;

/// Backend with canned answers. Every lookup returns what was configured,
/// label filters are applied to instances the way a real backend would.
#[derive(Default)]
pub struct FakeBackend {
    name: String,
    services: Mutex<Option<Lookup<Vec<Arc<Service>>>>>,
    get_service: Mutex<Option<Lookup<Option<Arc<Service>>>>>,
    instances: Mutex<Option<Lookup<Vec<Arc<ServiceInstance>>>>>,
    proxy_instances: Mutex<Option<Lookup<Vec<Arc<ServiceInstance>>>>>,
    management_ports: Mutex<Option<PortList>>,
    service_accounts: Mutex<Option<Vec<String>>>,
    services_gate: Mutex<Option<Arc<Notify>>>,
    reject_handlers: AtomicBool,
    ignore_cancel: AtomicBool,
    pub service_handlers: Mutex<Vec<ServiceHandler>>,
    pub instance_handlers: Mutex<Vec<InstanceHandler>>,
    pub runs_started: AtomicUsize,
    pub runs_finished: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    pub fn failure(&self, op: &str) -> ServiceRegistryError {
        ServiceRegistryError::unavailable(self.name.clone(), format!("{op} failed"))
    }

    pub fn with_services(self, services: Vec<Service>) -> Self {
        *self.services.lock() = Some(Ok(services.into_iter().map(Arc::new).collect()));
        self
    }

    pub fn with_shared_services(self, services: Vec<Arc<Service>>) -> Self {
        *self.services.lock() = Some(Ok(services));
        self
    }

    pub fn failing_services(self) -> Self {
        *self.services.lock() = Some(Err(self.failure("services")));
        self
    }

    /// `services` parks until `gate` is notified.
    pub fn gating_services(self, gate: Arc<Notify>) -> Self {
        *self.services_gate.lock() = Some(gate);
        self
    }

    pub fn with_service(self, service: Service) -> Self {
        *self.get_service.lock() = Some(Ok(Some(Arc::new(service))));
        self
    }

    pub fn failing_get_service(self) -> Self {
        *self.get_service.lock() = Some(Err(self.failure("get_service")));
        self
    }

    pub fn with_instances(self, instances: Vec<ServiceInstance>) -> Self {
        *self.instances.lock() = Some(Ok(instances.into_iter().map(Arc::new).collect()));
        self
    }

    pub fn failing_instances(self) -> Self {
        *self.instances.lock() = Some(Err(self.failure("instances")));
        self
    }

    pub fn with_proxy_instances(self, instances: Vec<ServiceInstance>) -> Self {
        *self.proxy_instances.lock() = Some(Ok(instances.into_iter().map(Arc::new).collect()));
        self
    }

    pub fn failing_proxy_instances(self) -> Self {
        *self.proxy_instances.lock() = Some(Err(self.failure("get_proxy_service_instances")));
        self
    }

    pub fn with_management_ports(self, ports: PortList) -> Self {
        *self.management_ports.lock() = Some(ports);
        self
    }

    pub fn with_service_accounts(self, accounts: &[&str]) -> Self {
        *self.service_accounts.lock() = Some(accounts.iter().map(|a| (*a).to_owned()).collect());
        self
    }

    pub fn rejecting_handlers(self) -> Self {
        self.reject_handlers.store(true, Ordering::SeqCst);
        self
    }

    /// `run` never returns, even after cancellation.
    pub fn ignoring_cancel(self) -> Self {
        self.ignore_cancel.store(true, Ordering::SeqCst);
        self
    }

    pub fn into_registry(self, kind: RegistryKind, cluster_id: &str) -> (Arc<Self>, Registry) {
        let backend = Arc::new(self);
        let registry = Registry::new(kind, cluster_id, backend.clone());
        (backend, registry)
    }

    fn instances_lookup(
        &self,
        hostname: &Hostname,
        labels: &LabelsCollection,
    ) -> Lookup<Vec<Arc<ServiceInstance>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.instances.lock().clone() {
            None => Ok(Vec::new()),
            Some(Err(e)) => Err(e),
            Some(Ok(all)) => Ok(all
                .into_iter()
                .filter(|i| &i.service.hostname == hostname && i.matches(labels))
                .collect()),
        }
    }
}

#[async_trait]
impl RegistryController for FakeBackend {
    async fn run(&self, cancel: CancellationToken) {
        self.runs_started.fetch_add(1, Ordering::SeqCst);
        if self.ignore_cancel.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        cancel.cancelled().await;
        self.runs_finished.fetch_add(1, Ordering::SeqCst);
    }

    fn append_service_handler(&self, handler: ServiceHandler) -> Result<(), ServiceRegistryError> {
        if self.reject_handlers.load(Ordering::SeqCst) {
            return Err(ServiceRegistryError::handler_rejected(
                self.name.clone(),
                "service handlers not supported",
            ));
        }
        self.service_handlers.lock().push(handler);
        Ok(())
    }

    fn append_instance_handler(
        &self,
        handler: InstanceHandler,
    ) -> Result<(), ServiceRegistryError> {
        if self.reject_handlers.load(Ordering::SeqCst) {
            return Err(ServiceRegistryError::handler_rejected(
                self.name.clone(),
                "instance handlers not supported",
            ));
        }
        self.instance_handlers.lock().push(handler);
        Ok(())
    }
}

#[async_trait]
impl ServiceDiscovery for FakeBackend {
    async fn services(&self) -> Result<Vec<Arc<Service>>, ServiceRegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.services_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.services.lock().clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_service(
        &self,
        _hostname: &Hostname,
    ) -> Result<Option<Arc<Service>>, ServiceRegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.get_service.lock().clone().unwrap_or(Ok(None))
    }

    async fn management_ports(&self, _addr: &str) -> Option<PortList> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.management_ports.lock().clone()
    }

    async fn instances(
        &self,
        hostname: &Hostname,
        _ports: &[String],
        labels: &LabelsCollection,
    ) -> Result<Vec<Arc<ServiceInstance>>, ServiceRegistryError> {
        self.instances_lookup(hostname, labels)
    }

    async fn instances_by_port(
        &self,
        hostname: &Hostname,
        port: u16,
        labels: &LabelsCollection,
    ) -> Result<Vec<Arc<ServiceInstance>>, ServiceRegistryError> {
        self.instances_lookup(hostname, labels).map(|found| {
            found
                .into_iter()
                .filter(|i| i.endpoint.service_port.port == port)
                .collect()
        })
    }

    async fn get_proxy_service_instances(
        &self,
        _proxy: &Proxy,
    ) -> Result<Vec<Arc<ServiceInstance>>, ServiceRegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.proxy_instances.lock().clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl ServiceAccounts for FakeBackend {
    async fn get_istio_service_accounts(
        &self,
        _hostname: &Hostname,
        _ports: &[String],
    ) -> Option<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.service_accounts.lock().clone()
    }
}

pub fn http_port() -> Port {
    Port::new("http", 9080, Protocol::Http)
}

pub fn instance(service: &Arc<Service>, ip: &str) -> ServiceInstance {
    ServiceInstance::new(Arc::clone(service), NetworkEndpoint::tcp(ip, 9080, http_port()))
}
