//! The top-level registry of named service backends.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use freshet_core::pipeline::Compiler;
use freshet_storage::Backend;

use crate::aggregator::DeliveryMode;
use crate::backend::ServiceBackend;
use crate::error::{ErrorList, ServiceError, ServiceResult};

/// The stream-processing service: a collection of named backends, each
/// carrying its own pipelines, aggregators and subscribers.
///
/// The delivery mode and the pipeline compiler are fixed at
/// construction and inherited by everything the service creates.
pub struct Service {
    mode: DeliveryMode,
    compiler: Arc<Compiler>,
    backends: DashMap<String, Arc<ServiceBackend>>,
}

impl Service {
    /// A service with the built-in pipeline functions and codecs.
    #[must_use]
    pub fn new(mode: DeliveryMode) -> Self {
        Self::with_compiler(mode, Compiler::with_defaults())
    }

    /// A service compiling definitions with a caller-supplied compiler.
    #[must_use]
    pub fn with_compiler(mode: DeliveryMode, compiler: Compiler) -> Self {
        Self { mode, compiler: Arc::new(compiler), backends: DashMap::new() }
    }

    /// Names of the registered backends.
    #[must_use]
    pub fn backends(&self) -> Vec<String> {
        self.backends.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Registers a storage backend under `name`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::DuplicateBackend`] when the name is taken; no
    /// mutation happens in that case.
    pub fn add_backend(
        &self,
        name: &str,
        backend: Arc<dyn Backend>,
    ) -> ServiceResult<Arc<ServiceBackend>> {
        match self.backends.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ServiceError::DuplicateBackend(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let service_backend = Arc::new(ServiceBackend::new(
                    name.to_string(),
                    backend,
                    self.mode,
                    Arc::clone(&self.compiler),
                ));
                vacant.insert(Arc::clone(&service_backend));
                info!(backend = name, "backend added");
                Ok(service_backend)
            }
        }
    }

    /// Looks up a backend by name.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownBackend`] when nothing is registered
    /// under `name`.
    pub fn get_backend(&self, name: &str) -> ServiceResult<Arc<ServiceBackend>> {
        self.backends
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ServiceError::UnknownBackend(name.to_string()))
    }

    /// Unregisters a backend and tears down everything it owns.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownBackend`], and teardown failures.
    pub fn rm_backend(&self, name: &str) -> ServiceResult<()> {
        let (_, backend) = self
            .backends
            .remove(name)
            .ok_or_else(|| ServiceError::UnknownBackend(name.to_string()))?;
        info!(backend = name, "backend removed");
        backend.close()
    }

    /// Tears down every backend.
    ///
    /// # Errors
    ///
    /// The aggregated teardown failures.
    pub fn close(&self) -> ServiceResult<()> {
        let mut errs = ErrorList::new();
        let names = self.backends();
        for name in names {
            if let Some((_, backend)) = self.backends.remove(&name) {
                errs.push(backend.close());
            }
        }
        errs.into_result()
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("mode", &self.mode)
            .field("backends", &self.backends())
            .finish()
    }
}
