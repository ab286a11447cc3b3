//! Server error types.

use thiserror::Error;

use freshet_service::ServiceError;

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced by the network edge.
#[derive(Debug, Error)]
pub enum ServerError {
    /// An inbound message could not be parsed.
    #[error("bad message: {0}")]
    BadMessage(String),

    /// An inbound message named a command that does not exist.
    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),

    /// The service rejected the request.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A network or file operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The configuration file was malformed.
    #[error("config error: {0}")]
    Config(String),
}
