//! Error types for service registry backends.

use thiserror::Error;

use crate::models::Hostname;

/// Errors a discovery backend reports back to its caller.
///
/// A backend that simply has nothing to say about a hostname returns an
/// empty or absent result instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceRegistryError {
    /// The backend could not answer the query (API down, cache not synced, ...).
    #[error("registry '{registry}' unavailable: {message}")]
    Unavailable {
        /// Name of the failing registry.
        registry: String,
        /// Backend-specific detail.
        message: String,
    },

    /// The backend was asked about a hostname it claims but cannot resolve.
    #[error("service '{0}' not found")]
    NotFound(Hostname),

    /// The backend refused to accept a change handler.
    #[error("registry '{registry}' rejected handler: {message}")]
    HandlerRejected {
        /// Name of the rejecting registry.
        registry: String,
        /// Backend-specific detail.
        message: String,
    },

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceRegistryError {
    #[must_use]
    pub fn unavailable(registry: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            registry: registry.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn handler_rejected(registry: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerRejected {
            registry: registry.into(),
            message: message.into(),
        }
    }
}
