//! One named backend inside a [`Service`](crate::Service): the registry
//! of its pipelines and reference-counted aggregators.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use freshet_core::pipeline::Compiler;
use freshet_core::EventSink;
use freshet_storage::Backend;

use crate::aggregator::{Aggregator, DeliveryMode};
use crate::error::{ErrorList, ServiceError, ServiceResult};
use crate::pipeline::{compile_graph, PipelineStream};

struct AggregatorEntry {
    aggregator: Arc<Aggregator>,
    refs: usize,
}

struct Inner {
    aggregators: HashMap<String, AggregatorEntry>,
    pipelines: HashMap<String, Arc<PipelineStream>>,
}

/// Maps logical stream names to pipelines and backend-stream names to
/// shared aggregators, on top of one storage [`Backend`].
///
/// The reference count of an aggregator counts the pipelines targeting
/// its backend stream plus the explicit subscriber registrations; the
/// entry disappears when the count reaches zero.
pub struct ServiceBackend {
    name: String,
    backend: Arc<dyn Backend>,
    mode: DeliveryMode,
    compiler: Arc<Compiler>,
    inner: Mutex<Inner>,
}

impl ServiceBackend {
    pub(crate) fn new(
        name: String,
        backend: Arc<dyn Backend>,
        mode: DeliveryMode,
        compiler: Arc<Compiler>,
    ) -> Self {
        Self {
            name,
            backend,
            mode,
            compiler,
            inner: Mutex::new(Inner { aggregators: HashMap::new(), pipelines: HashMap::new() }),
        }
    }

    /// This backend's name inside its service.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying storage backend.
    #[must_use]
    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    /// Lists (stream name, backend-stream name, definition) triples as
    /// parallel vectors.
    #[must_use]
    pub fn streams(&self) -> (Vec<String>, Vec<String>, Vec<Vec<serde_json::Value>>) {
        let inner = self.inner.lock();
        let mut names = Vec::with_capacity(inner.pipelines.len());
        let mut bstreams = Vec::with_capacity(inner.pipelines.len());
        let mut defs = Vec::with_capacity(inner.pipelines.len());
        for (name, pipeline) in &inner.pipelines {
            names.push(name.clone());
            bstreams.push(pipeline.backend_stream_name().to_string());
            defs.push(pipeline.defs().to_vec());
        }
        (names, bstreams, defs)
    }

    /// Compiles `defs` into a pipeline named `name` targeting the
    /// backend stream `bstream`, sharing its aggregator with any
    /// pipeline already targeting it.
    ///
    /// # Errors
    ///
    /// Duplicate stream names and compile failures, both leaving no
    /// state behind; storage failures opening the backend stream.
    pub fn add_stream(
        &self,
        bstream: &str,
        name: &str,
        defs: Vec<serde_json::Value>,
    ) -> ServiceResult<Arc<PipelineStream>> {
        let mut inner = self.inner.lock();
        if inner.pipelines.contains_key(name) {
            return Err(ServiceError::DuplicateStream {
                backend: self.name.clone(),
                stream: name.to_string(),
            });
        }

        // compile before touching the aggregator registry so a bad
        // definition creates nothing
        let compiled = compile_graph(&self.compiler, &defs)?;

        let entry = self.entry_or_create(&mut inner, bstream)?;
        entry.refs += 1;
        let aggregator = Arc::clone(&entry.aggregator);

        let pipeline = Arc::new(PipelineStream::new(aggregator, defs, compiled));
        inner.pipelines.insert(name.to_string(), Arc::clone(&pipeline));
        info!(backend = %self.name, stream = name, bstream, "stream added");
        Ok(pipeline)
    }

    /// Looks up a pipeline and the backend-stream name it feeds.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownStream`] when no such stream exists.
    pub fn get_stream(&self, name: &str) -> ServiceResult<(Arc<PipelineStream>, String)> {
        let inner = self.inner.lock();
        let pipeline = inner.pipelines.get(name).ok_or_else(|| ServiceError::UnknownStream {
            backend: self.name.clone(),
            stream: name.to_string(),
        })?;
        Ok((Arc::clone(pipeline), pipeline.backend_stream_name().to_string()))
    }

    /// Removes a pipeline; at refcount zero its aggregator goes too and
    /// the underlying backend stream is closed exactly once.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownStream`], and close failures.
    pub fn rm_stream(&self, name: &str) -> ServiceResult<()> {
        let (pipeline, released) = {
            let mut inner = self.inner.lock();
            let pipeline =
                inner.pipelines.remove(name).ok_or_else(|| ServiceError::UnknownStream {
                    backend: self.name.clone(),
                    stream: name.to_string(),
                })?;
            let released = Self::release(&mut inner, pipeline.backend_stream_name());
            (pipeline, released)
        };

        pipeline.close();
        let mut errs = ErrorList::new();
        if let Some(aggregator) = released {
            debug!(backend = %self.name, bstream = aggregator.stream_name(), "aggregator released");
            errs.push(aggregator.close());
        }
        info!(backend = %self.name, stream = name, "stream removed");
        errs.into_result()
    }

    /// Registers a subscriber on a backend stream, creating the
    /// aggregator lazily, and resolves the history interval.
    ///
    /// # Errors
    ///
    /// Range violations (which leave the refcount untouched) and
    /// storage failures.
    pub fn add_sub(
        &self,
        bstream: &str,
        sub: Arc<dyn EventSink>,
        hist_from: i64,
        hist_to: i64,
    ) -> ServiceResult<(u64, u64)> {
        let aggregator = {
            let mut inner = self.inner.lock();
            let entry = self.entry_or_create(&mut inner, bstream)?;
            entry.refs += 1;
            Arc::clone(&entry.aggregator)
        };

        match aggregator.add_sub(sub, hist_from, hist_to) {
            Ok(range) => Ok(range),
            Err(err) => {
                // roll the reference back; a failed subscribe must not
                // pin the aggregator
                let mut inner = self.inner.lock();
                Self::release(&mut inner, bstream);
                Err(err)
            }
        }
    }

    /// Unregisters a subscriber from a backend stream.
    ///
    /// Returns whether the handle was actually subscribed.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownBackendStream`] when no aggregator exists
    /// for `bstream`.
    pub fn rm_sub(&self, bstream: &str, sub: &Arc<dyn EventSink>) -> ServiceResult<bool> {
        let aggregator = {
            let mut inner = self.inner.lock();
            let entry = inner.aggregators.get(bstream).ok_or_else(|| {
                ServiceError::UnknownBackendStream {
                    backend: self.name.clone(),
                    stream: bstream.to_string(),
                }
            })?;
            let aggregator = Arc::clone(&entry.aggregator);
            Self::release(&mut inner, bstream);
            aggregator
        };
        Ok(aggregator.rm_sub(sub))
    }

    pub(crate) fn close(&self) -> ServiceResult<()> {
        let mut inner = self.inner.lock();
        let mut errs = ErrorList::new();
        for pipeline in inner.pipelines.values() {
            pipeline.close();
        }
        inner.pipelines.clear();
        for entry in inner.aggregators.values() {
            errs.push(entry.aggregator.close());
        }
        inner.aggregators.clear();
        errs.into_result()
    }

    #[cfg(test)]
    pub(crate) fn aggregator_refs(&self, bstream: &str) -> Option<usize> {
        self.inner.lock().aggregators.get(bstream).map(|entry| entry.refs)
    }

    fn entry_or_create<'a>(
        &self,
        inner: &'a mut Inner,
        bstream: &str,
    ) -> ServiceResult<&'a mut AggregatorEntry> {
        use std::collections::hash_map::Entry;
        match inner.aggregators.entry(bstream.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(vacant) => {
                let store = self.backend.get_stream(bstream)?;
                let aggregator = Arc::new(Aggregator::new(
                    self.name.clone(),
                    bstream.to_string(),
                    store,
                    self.mode,
                ));
                Ok(vacant.insert(AggregatorEntry { aggregator, refs: 0 }))
            }
        }
    }

    // Drops one reference; returns the aggregator when the count hits
    // zero and the entry is removed.
    fn release(inner: &mut Inner, bstream: &str) -> Option<Arc<Aggregator>> {
        let entry = inner.aggregators.get_mut(bstream)?;
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            return inner.aggregators.remove(bstream).map(|entry| entry.aggregator);
        }
        None
    }
}
