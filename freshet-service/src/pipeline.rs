//! The publish path: one compiled graph pumped one event at a time.

use std::sync::Arc;

use parking_lot::Mutex;

use freshet_core::pipeline::Compiler;
use freshet_core::{BoxStream, Event, EventStream};

use crate::aggregator::Aggregator;
use crate::error::ServiceResult;

// The one-event source at the root of every compiled graph. The slot is
// taken by the first pull after each publish, so a graph that skips the
// round (a filtered-out event) runs into end of input instead of seeing
// the same event twice.
struct InputSlot {
    slot: Arc<Mutex<Option<Event>>>,
}

impl EventStream for InputSlot {
    fn next(&mut self) -> freshet_core::Result<Option<Event>> {
        Ok(self.slot.lock().take())
    }
}

pub(crate) struct CompiledGraph {
    slot: Arc<Mutex<Option<Event>>>,
    graph: BoxStream,
}

pub(crate) fn compile_graph(
    compiler: &Compiler,
    defs: &[serde_json::Value],
) -> ServiceResult<CompiledGraph> {
    let slot = Arc::new(Mutex::new(None));
    let source = Box::new(InputSlot { slot: Arc::clone(&slot) });
    let graph = compiler.compile(source, defs)?;
    Ok(CompiledGraph { slot, graph })
}

/// A logical stream: a compiled transformation graph feeding an
/// [`Aggregator`].
///
/// `add` installs the published event in the graph's input slot and
/// pulls exactly one value from the root; whatever comes out is handed
/// to the aggregator. A pull that ends the round (every event filtered
/// out) forwards nothing and the publish still succeeds. One internal
/// lock is held across install-and-pull, so concurrent publishers
/// serialize and the graph's state is never interleaved.
pub struct PipelineStream {
    aggregator: Arc<Aggregator>,
    defs: Vec<serde_json::Value>,
    slot: Arc<Mutex<Option<Event>>>,
    graph: Mutex<BoxStream>,
}

impl PipelineStream {
    pub(crate) fn new(
        aggregator: Arc<Aggregator>,
        defs: Vec<serde_json::Value>,
        compiled: CompiledGraph,
    ) -> Self {
        Self { aggregator, defs, slot: compiled.slot, graph: Mutex::new(compiled.graph) }
    }

    /// The definition this pipeline was compiled from.
    #[must_use]
    pub fn defs(&self) -> &[serde_json::Value] {
        &self.defs
    }

    /// Name of the backend stream this pipeline feeds.
    #[must_use]
    pub fn backend_stream_name(&self) -> &str {
        self.aggregator.stream_name()
    }

    /// Publishes one event through the graph into the aggregator.
    ///
    /// # Errors
    ///
    /// A pull failure fails this publish only; the pipeline stays
    /// healthy. Delivery failures come back aggregated from the hub.
    pub fn add(&self, evt: Event) -> ServiceResult<()> {
        let mut graph = self.graph.lock();
        *self.slot.lock() = Some(evt);
        match graph.next()? {
            Some(out) => self.aggregator.add(out),
            None => Ok(()),
        }
    }

    /// Reads `[from, to)` from the underlying backend stream.
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    pub fn read(&self, from: u64, to: u64) -> ServiceResult<BoxStream> {
        self.aggregator.read(from, to)
    }

    /// Deletes `[from, to)` from the underlying backend stream.
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    pub fn del(&self, from: u64, to: u64) -> ServiceResult<bool> {
        self.aggregator.del(from, to)
    }

    /// Length of the underlying backend stream.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub fn len(&self) -> ServiceResult<u64> {
        self.aggregator.len()
    }

    /// Resolves a possibly-relative interval against the underlying
    /// stream's length.
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    pub fn interval(&self, from: i64, to: i64) -> ServiceResult<(u64, u64)> {
        self.aggregator.interval(from, to)
    }

    /// Clears the input slot. Graph nodes own no other resources.
    pub fn close(&self) {
        self.slot.lock().take();
    }
}
