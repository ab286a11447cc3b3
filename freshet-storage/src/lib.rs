//! # Freshet Storage
//!
//! The storage contract and the backends this library ships.
//!
//! A [`Backend`] is a registry of named [`BackendStream`]s: ordered,
//! append-only logs of events with dense 0-based indices, random-access
//! slice reads and compacting deletes. The fan-out core depends only on
//! this contract; which implementation is active is configuration.
//!
//! Shipped backends:
//!
//! - [`null`]: accepts and discards everything
//! - [`mem`]: in-memory, any event kind
//! - [`dir`]: one line-per-event append file per stream
//! - [`kv`]: embedded list-KV store on `redb`
//! - [`http`]: forwards to another instance over JSON-over-HTTP
//!
//! [`registry::BackendRegistry`] builds backends from self-describing
//! config descriptors, and [`handler::BackendHandler`] serves a backend
//! over the wire protocol the `http` backend speaks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dir;
mod error;
pub mod handler;
pub mod http;
pub mod kv;
pub mod mem;
pub mod null;
pub mod poster;
pub mod range;
pub mod registry;
pub mod wire;

pub use error::{StorageError, StorageResult};

use std::sync::Arc;

use freshet_core::{BoxStream, Event};

/// A named, ordered, append-only log of events inside a [`Backend`].
///
/// Indices are 0-based and dense. `len` is strictly non-decreasing under
/// `add` alone; `del(from, to)` compacts by removing `[from, to)` and
/// shifting later entries down. Ranges are half-open with
/// `0 <= from <= to <= len`. Concurrent readers are allowed; writers
/// serialize with readers per stream.
pub trait BackendStream: Send + Sync {
    /// Appends one event at index `len()`.
    ///
    /// # Errors
    ///
    /// Storage failures, or a type mismatch for byte-oriented backends.
    fn add(&self, evt: Event) -> StorageResult<()>;

    /// Number of events currently stored.
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn len(&self) -> StorageResult<u64>;

    /// Whether the stream holds no events.
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads the absolute range `[from, to)` as a stream.
    ///
    /// `read(x, x)` is an empty stream.
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    fn read(&self, from: u64, to: u64) -> StorageResult<BoxStream>;

    /// Deletes the absolute range `[from, to)`, compacting the log.
    ///
    /// `del(x, x)` is a no-op returning `true`.
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    fn del(&self, from: u64, to: u64) -> StorageResult<bool>;

    /// Resolves a possibly-relative interval into absolute bounds
    /// against the current length (`-1` means `len`, `-2` means
    /// `len - 1`, and so on; see [`range::resolve`]).
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    fn interval(&self, from: i64, to: i64) -> StorageResult<(u64, u64)> {
        if from == to {
            return Ok((0, 0));
        }
        range::resolve(from, to, self.len()?)
    }

    /// Releases the stream handle.
    ///
    /// # Errors
    ///
    /// Storage failures while releasing.
    fn close(&self) -> StorageResult<()>;
}

/// A storage system holding named event streams.
pub trait Backend: Send + Sync {
    /// A self-describing `{type, arg}` descriptor from which
    /// [`registry::BackendRegistry::from_config`] can rebuild this
    /// backend.
    ///
    /// # Errors
    ///
    /// Storage failures while describing the backend.
    fn config(&self) -> StorageResult<serde_json::Value>;

    /// Lists the streams this backend currently holds.
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn streams(&self) -> StorageResult<Vec<String>>;

    /// Returns the stream named `name`, creating an empty one if absent.
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn get_stream(&self, name: &str) -> StorageResult<Arc<dyn BackendStream>>;

    /// Destroys every stream and any supporting state.
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn drop_all(&self) -> StorageResult<()>;

    /// Releases the backend handle.
    ///
    /// # Errors
    ///
    /// Storage failures while releasing.
    fn close(&self) -> StorageResult<()>;
}
