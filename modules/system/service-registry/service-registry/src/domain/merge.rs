//! Merges per-registry service lists into one service per hostname.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use service_registry_sdk::{Hostname, Service};

/// Accumulates services across registries, visited in store order.
///
/// The first service seen for a hostname is copied and becomes the merged
/// representative; its non-address fields win. Every registry with a cluster
/// id then records its own address for the hostname on that copy. Values
/// handed in by backends are never mutated.
#[derive(Debug, Default)]
pub struct ServiceMerger {
    index: HashMap<Hostname, usize>,
    merged: Vec<Service>,
}

impl ServiceMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, cluster_id: &str, reported: &[Arc<Service>]) {
        for svc in reported {
            let slot = match self.index.entry(svc.hostname.clone()) {
                Entry::Occupied(e) => *e.get(),
                Entry::Vacant(e) => {
                    self.merged.push(Service::clone(svc));
                    *e.insert(self.merged.len() - 1)
                }
            };

            if !cluster_id.is_empty() {
                self.merged[slot]
                    .addresses
                    .insert(cluster_id.to_owned(), svc.address.clone());
            }
        }
    }

    /// Merged services in first-seen order.
    pub fn finish(self) -> Vec<Arc<Service>> {
        self.merged.into_iter().map(Arc::new).collect()
    }
}
