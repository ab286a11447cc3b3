//! Error types for the core stream and pipeline machinery.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while pulling events through a stream graph.
///
/// End of input is not an error: streams signal it by returning
/// `Ok(None)` from [`next`](crate::EventStream::next).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A combinator received an event of the wrong shape.
    #[error("{op}: expected {expected}, got {got}")]
    Shape {
        /// Name of the combinator that rejected the event.
        op: &'static str,
        /// What the combinator required.
        expected: String,
        /// What it actually saw.
        got: String,
    },

    /// Encoding or decoding an event failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// A pipeline definition failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// An underlying event source (storage, network) failed.
    #[error("source error: {0}")]
    Source(String),

    /// A downstream sink rejected an event.
    #[error("sink error: {0}")]
    Sink(String),
}

impl Error {
    /// Shorthand for a [`Error::Shape`] mismatch.
    pub fn shape(op: &'static str, expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::Shape { op, expected: expected.into(), got: got.into() }
    }
}

/// Errors detected while compiling a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The definition referenced a function that was never registered.
    #[error("no function named \"{0}\"")]
    UnknownFunction(String),

    /// A function was applied to the wrong number of arguments.
    #[error("{name}: expected {expected} arguments, got {got}")]
    Arity {
        /// Function name as written in the definition.
        name: String,
        /// Human-readable arity requirement, e.g. `"2"` or `"more than 1"`.
        expected: String,
        /// Number of arguments supplied.
        got: usize,
    },

    /// A function argument had the wrong shape.
    #[error("{name}: expected {expected} as argument {index}, got {got}")]
    Argument {
        /// Function name as written in the definition.
        name: String,
        /// Zero-based argument position.
        index: usize,
        /// What the function required.
        expected: String,
        /// The offending argument, rendered as JSON.
        got: String,
    },

    /// `save` was asked to bind a name that is already bound.
    #[error("save: stream \"{0}\" is already bound")]
    DuplicateName(String),

    /// A name was used as a stream but nothing is bound to it.
    #[error("no stream named \"{0}\"")]
    UnboundName(String),

    /// `encode` referenced an encoder that was never registered.
    #[error("no encoder named \"{0}\"")]
    UnknownEncoder(String),

    /// `decode` referenced a decoder that was never registered.
    #[error("no decoder named \"{0}\"")]
    UnknownDecoder(String),

    /// The expression was not a name or a single-key object.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
}
