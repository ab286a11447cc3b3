//! Push interface for event consumers.

use crate::error::Result;
use crate::event::Event;
use crate::stream::EventStream;

/// Push-side counterpart of [`EventStream`](crate::EventStream): anything
/// that can accept events one at a time.
///
/// Sinks are shared handles (`Arc<dyn EventSink>`): backend streams, live
/// subscribers and buffering wrappers all implement this trait, and the
/// fan-out hub treats them uniformly.
pub trait EventSink: Send + Sync {
    /// Pushes one event into the sink.
    ///
    /// # Errors
    ///
    /// Returns an error when the sink cannot accept the event; the caller
    /// decides whether that aborts anything (the fan-out hub does not).
    fn add(&self, evt: Event) -> Result<()>;

    /// Releases the sink. Further `add` calls are unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error when releasing underlying resources fails.
    fn close(&self) -> Result<()>;
}

/// Pumps every remaining event of `from` into `to`.
///
/// # Errors
///
/// Stops at and returns the first pull or push error.
pub fn copy(from: &mut dyn EventStream, to: &dyn EventSink) -> Result<()> {
    while let Some(evt) = from.next()? {
        to.add(evt)?;
    }
    Ok(())
}
