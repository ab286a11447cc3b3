//! Fan-out of one pull stream to many independent readers.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::stream::{BoxStream, EventStream};

/// Shares one upstream between any number of independent readers.
///
/// Every reader sees the full upstream sequence in order. The coordinator
/// keeps one queue per reader: a reader with a non-empty queue pops from
/// it; otherwise it pulls the upstream once and the value is queued for
/// every *other* reader. Memory use is proportional to the skew between
/// the fastest and slowest reader.
///
/// Real upstream errors latch: every later pull re-yields them. End of
/// input does not latch: a later pull tries the upstream again, which is
/// what lets a pipeline's refillable input slot resume after a round in
/// which it was exhausted.
///
/// The original stream must not be used directly once handed to a
/// multiplexer.
pub struct Multiplexer {
    shared: Arc<Mutex<Shared>>,
}

struct Shared {
    upstream: BoxStream,
    queues: Vec<VecDeque<Event>>,
    failure: Option<Error>,
    high_water: usize,
}

impl Multiplexer {
    /// Wraps `upstream` for shared consumption.
    #[must_use]
    pub fn new(upstream: BoxStream) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                upstream,
                queues: Vec::new(),
                failure: None,
                high_water: 0,
            })),
        }
    }

    /// Creates a new independent reader of the upstream.
    #[must_use]
    pub fn reader(&self) -> MultiplexedStream {
        let mut shared = self.shared.lock();
        shared.queues.push(VecDeque::new());
        MultiplexedStream { shared: Arc::clone(&self.shared), index: shared.queues.len() - 1 }
    }

    /// Deepest any reader's queue has ever been; a skew diagnostic.
    #[must_use]
    pub fn high_water(&self) -> usize {
        self.shared.lock().high_water
    }
}

/// One reader of a [`Multiplexer`].
pub struct MultiplexedStream {
    shared: Arc<Mutex<Shared>>,
    index: usize,
}

impl EventStream for MultiplexedStream {
    fn next(&mut self) -> Result<Option<Event>> {
        let mut shared = self.shared.lock();
        if let Some(evt) = shared.queues[self.index].pop_front() {
            return Ok(Some(evt));
        }
        if let Some(err) = &shared.failure {
            return Err(err.clone());
        }
        match shared.upstream.next() {
            Ok(Some(evt)) => {
                let own = self.index;
                let mut deepest = shared.high_water;
                for (i, queue) in shared.queues.iter_mut().enumerate() {
                    if i != own {
                        queue.push_back(evt.clone());
                        deepest = deepest.max(queue.len());
                    }
                }
                shared.high_water = deepest;
                Ok(Some(evt))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                shared.failure = Some(err.clone());
                Err(err)
            }
        }
    }
}
