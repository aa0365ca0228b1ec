use service_registry_sdk::ClusterId;

/// Domain-level errors for the aggregator itself (as opposed to errors
/// reported by backends).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("registry for cluster '{0}' is already registered")]
    DuplicateCluster(ClusterId),

    #[error("invalid service registry configuration: {0}")]
    Config(String),
}
