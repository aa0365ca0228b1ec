#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Store mutation and queries running side by side.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::FakeBackend;
use service_registry::AggregateController;
use service_registry_sdk::{RegistryKind, Service};
use tokio::sync::Notify;
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(2);

fn add(aggregate: &AggregateController, cluster_id: &str, backend: FakeBackend) -> Arc<FakeBackend> {
    let (backend, registry) = backend.into_registry(RegistryKind::Kubernetes, cluster_id);
    aggregate.add_registry(registry).unwrap();
    backend
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocked_backend_does_not_block_store_mutation() {
    let aggregate = Arc::new(AggregateController::new());
    let gate = Arc::new(Notify::new());
    let slow = add(
        &aggregate,
        "a",
        FakeBackend::new("a")
            .with_services(vec![Service::new("svc.ns", "10.0.0.1")])
            .gating_services(Arc::clone(&gate)),
    );

    let listing = tokio::spawn({
        let aggregate = Arc::clone(&aggregate);
        async move { aggregate.services().await }
    });

    timeout(DEADLINE, async {
        while slow.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("services call did not reach the backend");

    let mutation = tokio::task::spawn_blocking({
        let aggregate = Arc::clone(&aggregate);
        move || {
            let (_, registry) = FakeBackend::new("b").into_registry(RegistryKind::Consul, "b");
            aggregate.add_registry(registry).unwrap();
            assert!(aggregate.delete_registry("b"));
            let (_, registry) = FakeBackend::new("c").into_registry(RegistryKind::Consul, "c");
            aggregate.add_registry(registry).unwrap();
        }
    });
    timeout(Duration::from_millis(500), mutation)
        .await
        .expect("store mutation waited on a backend call")
        .unwrap();
    assert!(!listing.is_finished());

    gate.notify_one();
    let listing = timeout(DEADLINE, listing).await.unwrap().unwrap();

    // the listing works on the registries present when it started
    assert!(listing.errors.is_none());
    assert_eq!(listing.services.len(), 1);
    assert_eq!(listing.services[0].addresses.len(), 1);
    assert_eq!(listing.services[0].addresses["a"], "10.0.0.1");
    assert_eq!(aggregate.cluster_ids(), ["a", "c"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_listings_see_identical_addresses() {
    let aggregate = Arc::new(AggregateController::new());
    let shared = Arc::new(Service::new("svc.ns", "10.0.0.1"));
    add(
        &aggregate,
        "a",
        FakeBackend::new("a").with_shared_services(vec![Arc::clone(&shared)]),
    );
    add(
        &aggregate,
        "b",
        FakeBackend::new("b").with_services(vec![Service::new("svc.ns", "10.0.1.1")]),
    );

    let listings: Vec<_> = (0..16)
        .map(|_| {
            let aggregate = Arc::clone(&aggregate);
            tokio::spawn(async move { aggregate.services().await })
        })
        .collect();

    for listing in listings {
        let services = timeout(DEADLINE, listing)
            .await
            .unwrap()
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(services.len(), 1);
        let addresses = &services[0].addresses;
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses["a"], "10.0.0.1");
        assert_eq!(addresses["b"], "10.0.1.1");
    }
    assert!(shared.addresses.is_empty());
}
