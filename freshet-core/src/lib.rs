//! # Freshet Core
//!
//! Core building blocks for the Freshet streaming service:
//!
//! - The opaque [`Event`] value and its structural operations
//! - The pull-based [`EventStream`] abstraction and a library of lazy,
//!   composable combinators
//! - A [`stream::Multiplexer`] that lets many readers consume independent
//!   copies of one source
//! - The [`pipeline::Compiler`] that turns declarative JSON definitions
//!   into executable dataflow graphs
//! - Encoder/decoder registries for byte-level event conversion
//!
//! Streams are lazy and single-consumer: nothing is pulled from an
//! upstream until a downstream asks for it, and a stream must not be
//! shared between consumers unless it is explicitly multiplexed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod sink;
pub mod stream;

pub use error::{CompileError, Error, Result};
pub use event::Event;
pub use sink::EventSink;
pub use stream::{BoxStream, EventStream};

/// Re-export of commonly used types.
pub mod prelude {
    pub use crate::codec::{CodecRegistry, Decoder, Encoder};
    pub use crate::pipeline::Compiler;
    pub use crate::{BoxStream, Error, Event, EventSink, EventStream, Result};
    pub use bytes::Bytes;
}
