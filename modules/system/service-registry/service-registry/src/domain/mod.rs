//! Domain layer for the service registry aggregator.

pub mod aggregate_error;
pub mod controller;
pub mod error;
mod merge;
pub mod registry;

pub use aggregate_error::{CompositeError, ErrorAccumulator};
pub use controller::{AggregateController, ServiceListing};
pub use error::DomainError;
pub use registry::{Registry, RegistryStore};
