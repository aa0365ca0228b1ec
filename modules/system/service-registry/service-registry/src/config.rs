//! Configuration for the service registry aggregator.

use std::time::Duration;

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Section of the host configuration holding this module's settings.
pub const CONFIG_SECTION: &str = "service_registry";

const DEFAULT_WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Aggregator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregateConfig {
    /// Reject a registry whose cluster id is already registered.
    ///
    /// Off by default: duplicates are kept and the one registered first
    /// answers first-match lookups.
    pub unique_cluster_ids: bool,

    /// After cancellation, wait for backend workers to return before `run`
    /// completes (bounded by `worker_join_timeout`).
    pub join_workers_on_stop: bool,

    /// Upper bound for the worker join, e.g. `"5s"` or `"250ms"`.
    #[serde(with = "humantime_serde")]
    pub worker_join_timeout: Duration,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            unique_cluster_ids: false,
            join_workers_on_stop: false,
            worker_join_timeout: DEFAULT_WORKER_JOIN_TIMEOUT,
        }
    }
}

impl AggregateConfig {
    /// Extract the `service_registry` section, falling back to defaults when
    /// the section is absent.
    ///
    /// # Errors
    /// Returns `DomainError::Config` if the section exists but is invalid.
    pub fn from_figment(figment: &Figment) -> Result<Self, DomainError> {
        if !figment.contains(CONFIG_SECTION) {
            return Ok(Self::default());
        }

        figment
            .extract_inner::<Self>(CONFIG_SECTION)
            .map_err(|e| DomainError::Config(e.to_string()))
    }
}
