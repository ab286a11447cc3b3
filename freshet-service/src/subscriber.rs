//! Subscriber-side sinks: the buffering wrapper used during history
//! replay, and the replay helpers.

use parking_lot::Mutex;

use freshet_core::{Event, EventSink, EventStream, Result};

/// Wraps a sink so that live events queue up while history is replayed.
///
/// The wrapper starts BUFFERING: [`add`](EventSink::add) appends to an
/// internal queue. The one-way [`start`](BufferedSink::start) transition
/// to LIVE drains the queue in order; from then on `add` flushes
/// anything still pending and passes events straight through.
/// [`add_direct`] bypasses the buffer entirely; the history replay loop
/// uses it while live events are still being queued.
///
/// One internal lock serializes queue appends, the flush, and direct
/// pushes, so the base sink always observes: history, then the queued
/// live events in arrival order, then future live events.
///
/// [`add_direct`]: BufferedSink::add_direct
pub struct BufferedSink<S> {
    base: S,
    inner: Mutex<Inner>,
}

struct Inner {
    live: bool,
    queue: Vec<Event>,
}

impl<S: EventSink> BufferedSink<S> {
    /// Wraps `base`, starting in BUFFERING mode.
    pub fn new(base: S) -> Self {
        Self { base, inner: Mutex::new(Inner { live: false, queue: Vec::new() }) }
    }

    /// Flips one-way from BUFFERING to LIVE and drains what queued up.
    ///
    /// A drain failure leaves the rest queued; the next `add` retries.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        inner.live = true;
        while !inner.queue.is_empty() {
            let next = inner.queue.remove(0);
            if self.base.add(next.clone()).is_err() {
                inner.queue.insert(0, next);
                break;
            }
        }
    }

    /// Pushes straight to the base sink, bypassing the buffer.
    ///
    /// # Errors
    ///
    /// Whatever the base sink returns.
    pub fn add_direct(&self, evt: Event) -> Result<()> {
        let _guard = self.inner.lock();
        self.base.add(evt)
    }

    /// The wrapped sink.
    pub fn base(&self) -> &S {
        &self.base
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.inner.lock().queue.len()
    }
}

impl<S: EventSink> EventSink for BufferedSink<S> {
    fn add(&self, evt: Event) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.live {
            inner.queue.push(evt);
            return Ok(());
        }
        // flush everything queued before this event, keeping order; a
        // failure leaves the rest (this event included) queued
        inner.queue.push(evt);
        while !inner.queue.is_empty() {
            let next = inner.queue.remove(0);
            if let Err(err) = self.base.add(next.clone()) {
                inner.queue.insert(0, next);
                return Err(err);
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.base.close()
    }
}

/// Replays a history stream into the buffered sink through the direct
/// path.
///
/// # Errors
///
/// The first pull or push failure.
pub fn replay<S: EventSink>(
    history: &mut dyn EventStream,
    sink: &BufferedSink<S>,
) -> Result<()> {
    while let Some(evt) = history.next()? {
        sink.add_direct(evt)?;
    }
    Ok(())
}
