//! Service error types and error aggregation.

use thiserror::Error;

use freshet_storage::StorageError;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

fn render_list(errors: &[ServiceError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Errors surfaced by the service runtime.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// `add_backend` with a name that is already taken.
    #[error("backend \"{0}\" already exists")]
    DuplicateBackend(String),

    /// No backend registered under the given name.
    #[error("no backend named \"{0}\"")]
    UnknownBackend(String),

    /// `add_stream` with a stream name that is already taken.
    #[error("backend \"{backend}\" already has stream \"{stream}\"")]
    DuplicateStream {
        /// Service backend name.
        backend: String,
        /// Offending stream name.
        stream: String,
    },

    /// No stream registered under the given name.
    #[error("backend \"{backend}\" has no stream \"{stream}\"")]
    UnknownStream {
        /// Service backend name.
        backend: String,
        /// Missing stream name.
        stream: String,
    },

    /// No aggregator exists for the given backend-stream.
    #[error("backend \"{backend}\" has no backend stream \"{stream}\"")]
    UnknownBackendStream {
        /// Service backend name.
        backend: String,
        /// Missing backend-stream name.
        stream: String,
    },

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A pipeline pull or compile failed.
    #[error(transparent)]
    Stream(#[from] freshet_core::Error),

    /// Several independent failures, e.g. one per subscriber.
    #[error("multiple failures: {}", render_list(.0))]
    Aggregate(Vec<ServiceError>),
}

/// Collects failures from a sequence of calls into one result.
///
/// Empty lists collapse to success and single entries to themselves;
/// nested aggregates are inlined so lists never contain lists.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<ServiceError>,
}

impl ErrorList {
    /// An empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the failure of `result`, if any.
    pub fn push<T>(&mut self, result: ServiceResult<T>) {
        if let Err(err) = result {
            self.push_err(err);
        }
    }

    /// Records one failure, inlining aggregates.
    pub fn push_err(&mut self, err: ServiceError) {
        match err {
            ServiceError::Aggregate(errors) => {
                for e in errors {
                    self.push_err(e);
                }
            }
            other => self.errors.push(other),
        }
    }

    /// Whether nothing failed so far.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapses the list into a single result.
    ///
    /// # Errors
    ///
    /// The single recorded failure, or an aggregate of all of them.
    pub fn into_result(mut self) -> ServiceResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ServiceError::Aggregate(self.errors)),
        }
    }
}
