//! The pull-based stream abstraction and its combinator library.
//!
//! A stream yields events one at a time until it signals end of input by
//! returning `Ok(None)`. Streams are lazy: combinators pull from their
//! upstreams only when pulled themselves. A stream is single-consumer;
//! use a [`Multiplexer`] to give several consumers independent copies of
//! one source.

pub mod combinators;
mod multiplex;

pub use multiplex::{MultiplexedStream, Multiplexer};

use crate::error::Result;
use crate::event::Event;

/// A one-shot, lazy source of events.
///
/// The contract:
///
/// - `Ok(Some(event))`: the next event.
/// - `Ok(None)`: end of input; the consumer must stop pulling.
/// - `Err(..)`: a real failure. End of input is never an error.
///
/// Pulling again after a terminal result is unspecified (it will not be
/// unsound, but the values returned are implementation-defined).
pub trait EventStream: Send {
    /// Pulls the next event.
    ///
    /// # Errors
    ///
    /// Propagates failures from this stream or any of its upstreams.
    fn next(&mut self) -> Result<Option<Event>>;

    /// Number of events left, when known without consuming the stream.
    fn remaining(&self) -> Option<usize> {
        None
    }

    /// Releases remaining events without handing them out one by one.
    ///
    /// # Errors
    ///
    /// The default implementation pulls to exhaustion and propagates the
    /// first failure; implementations with cheap release override it.
    fn drain(&mut self) -> Result<()> {
        while self.next()?.is_some() {}
        Ok(())
    }
}

impl<S: EventStream + ?Sized> EventStream for Box<S> {
    fn next(&mut self) -> Result<Option<Event>> {
        (**self).next()
    }

    fn remaining(&self) -> Option<usize> {
        (**self).remaining()
    }

    fn drain(&mut self) -> Result<()> {
        (**self).drain()
    }
}

/// A boxed stream, the unit of composition in compiled pipelines.
pub type BoxStream = Box<dyn EventStream>;

impl std::fmt::Debug for dyn EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn EventStream")
    }
}

/// Number of events left in the stream.
///
/// Uses the stream's own size knowledge when available, otherwise counts
/// by consuming it.
///
/// # Errors
///
/// Propagates the first pull failure.
pub fn count(stream: &mut dyn EventStream) -> Result<usize> {
    if let Some(n) = stream.remaining() {
        return Ok(n);
    }
    let mut n = 0;
    while stream.next()?.is_some() {
        n += 1;
    }
    Ok(n)
}

/// Collects every remaining event into a vector.
///
/// # Errors
///
/// Propagates the first pull failure.
pub fn collect(stream: &mut dyn EventStream) -> Result<Vec<Event>> {
    let mut out = Vec::new();
    while let Some(evt) = stream.next()? {
        out.push(evt);
    }
    Ok(out)
}
