//! Service Registry Module
//!
//! This module aggregates any number of discovery backends (one per cluster
//! or platform) into a single registry view. Lookups fan out over the
//! registered backends in registration order:
//!
//! - services are merged by hostname, recording the address each cluster
//!   reports for them
//! - single-answer lookups take the first backend that knows the answer
//! - instance lookups union what every backend reports
//!
//! Backend failures are collected into a [`CompositeError`] and only surface
//! when no backend produced a usable answer.
//!
//! ```ignore
//! let aggregate = Arc::new(AggregateController::new());
//! aggregate.add_registry(Registry::new(RegistryKind::Kubernetes, "east", east))?;
//! aggregate.add_registry(Registry::new(RegistryKind::Consul, "west", west))?;
//!
//! tokio::spawn({
//!     let aggregate = Arc::clone(&aggregate);
//!     async move { aggregate.run(cancel).await }
//! });
//!
//! let listing = aggregate.services().await;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;

pub use config::AggregateConfig;
pub use domain::{
    AggregateController, CompositeError, DomainError, ErrorAccumulator, Registry, RegistryStore,
    ServiceListing,
};
