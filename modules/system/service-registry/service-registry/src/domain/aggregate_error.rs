//! Composite error collected while fanning a query out over many registries.

use service_registry_sdk::ServiceRegistryError;

/// Every backend failure seen during one fan-out call, in registry order.
///
/// Never empty: an aggregation without failures yields no `CompositeError`
/// at all (see [`ErrorAccumulator::finish`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render(.errors))]
pub struct CompositeError {
    errors: Vec<ServiceRegistryError>,
}

impl CompositeError {
    /// Underlying backend errors, in the order they were raised.
    #[must_use]
    pub fn errors(&self) -> &[ServiceRegistryError] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<ServiceRegistryError> {
        self.errors
    }
}

fn render(errors: &[ServiceRegistryError]) -> String {
    let header = if errors.len() == 1 {
        "1 error occurred:".to_owned()
    } else {
        format!("{} errors occurred:", errors.len())
    };
    errors
        .iter()
        .fold(header, |out, err| format!("{out}\n\t* {err}"))
}

/// Collects backend failures during a fan-out.
///
/// Pushing never stops the caller's iteration; duplicates are kept.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    errors: Vec<ServiceRegistryError>,
}

impl ErrorAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: ServiceRegistryError) {
        self.errors.push(err);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `None` when nothing was pushed, otherwise the composite.
    #[must_use]
    pub fn finish(self) -> Option<CompositeError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(CompositeError {
                errors: self.errors,
            })
        }
    }
}
