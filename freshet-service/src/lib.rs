//! # Freshet Service
//!
//! The fan-out runtime: the piece that connects published events,
//! compiled pipelines, persistent storage and live subscribers.
//!
//! A [`Service`] maps names to [`ServiceBackend`]s. Each service backend
//! owns, per backend-stream, one [`Aggregator`] (the hub that forwards
//! every event to the persistent [`BackendStream`] and to every live
//! subscriber) and, per logical stream, one [`PipelineStream`] that
//! pumps published events through a compiled transformation graph into
//! its aggregator. Aggregators are shared between pipelines and
//! subscribers by reference count.
//!
//! Lock order, shallow to deep: service registry, service backend,
//! aggregator, backend stream. Nothing takes a shallower lock while
//! holding a deeper one.
//!
//! [`BackendStream`]: freshet_storage::BackendStream

#![warn(missing_docs)]
#![warn(clippy::all)]

mod aggregator;
mod backend;
mod error;
mod pipeline;
mod service;
pub mod subscriber;

pub use aggregator::{Aggregator, DeliveryMode};
pub use backend::ServiceBackend;
pub use error::{ErrorList, ServiceError, ServiceResult};
pub use pipeline::PipelineStream;
pub use service::Service;
