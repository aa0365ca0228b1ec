//! Service Registry SDK
//!
//! This crate provides the contract every discovery backend implements so the
//! `service-registry` aggregator can treat it as one cluster of the mesh:
//!
//! - [`RegistryController`] - lifecycle and change-handler registration
//! - [`ServiceDiscovery`] - service, instance, port and proxy lookups
//! - [`ServiceAccounts`] - trust identities behind a service
//! - [`ServiceRegistryBackend`] - the three capabilities composed
//! - [`Service`], [`ServiceInstance`], [`Proxy`] and friends - domain models
//! - [`ServiceRegistryError`] - error reported by a backend
//!
//! ## Usage
//!
//! ```ignore
//! use service_registry_sdk::{Hostname, ServiceDiscovery};
//!
//! let svc = backend.get_service(&Hostname::from("reviews.default.svc.cluster.local")).await?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;

// Re-export main types at crate root
pub use api::{
    InstanceHandler, RegistryController, ServiceAccounts, ServiceDiscovery, ServiceHandler,
    ServiceRegistryBackend,
};
pub use error::ServiceRegistryError;
pub use models::{
    AddressFamily, ClusterId, Event, Hostname, Labels, LabelsCollection, NetworkEndpoint, Port,
    PortList, Protocol, Proxy, ProxyKind, RegistryKind, Resolution, Service, ServiceInstance,
};
