//! The remote backend: forwards every operation to another instance
//! over JSON-over-HTTP.
//!
//! The peer serves the protocol of [`crate::handler::BackendHandler`]
//! under some base URL. All requests are POSTs; protocol failures ride
//! in the `error` field of the response body.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use freshet_core::stream::combinators::from_events;
use freshet_core::{BoxStream, Event};

use crate::poster::{HttpPoster, Poster};
use crate::wire::{ConfigRes, ErrorRes, EventsRes, LenRes, OkRes, StreamsRes};
use crate::{Backend, BackendStream, StorageError, StorageResult};

fn parse<T: serde::de::DeserializeOwned>(body: &[u8]) -> StorageResult<T> {
    serde_json::from_slice(body).map_err(|e| StorageError::Remote(e.to_string()))
}

fn check_error(error: Option<String>) -> StorageResult<()> {
    match error {
        Some(message) => Err(StorageError::Remote(message)),
        None => Ok(()),
    }
}

/// One stream of a [`RemoteBackend`].
pub struct RemoteStream {
    base_url: String,
    poster: Arc<dyn Poster>,
}

impl RemoteStream {
    fn url(&self, suffix: &str) -> String {
        format!("{}/{}", self.base_url, suffix)
    }
}

impl BackendStream for RemoteStream {
    fn add(&self, evt: Event) -> StorageResult<()> {
        let bytes = match evt {
            Event::Bytes(bytes) => bytes,
            other => return Err(StorageError::ExpectedBytes { op: "add", got: other.kind() }),
        };
        let body = self.poster.post(&self.url("push"), &bytes)?;
        let res: ErrorRes = parse(&body)?;
        check_error(res.error)
    }

    fn len(&self) -> StorageResult<u64> {
        let body = self.poster.post(&self.url("len"), &[])?;
        let res: LenRes = parse(&body)?;
        check_error(res.error)?;
        Ok(res.len)
    }

    fn read(&self, from: u64, to: u64) -> StorageResult<BoxStream> {
        if from == to {
            return Ok(from_events(Vec::new()));
        }
        let body = self.poster.post(&self.url(&format!("read/{from}:{to}")), &[])?;
        let res: EventsRes = parse(&body)?;
        check_error(res.error)?;
        let events = res
            .events
            .into_iter()
            .map(|raw| Event::Bytes(Bytes::from(raw.get().as_bytes().to_vec())))
            .collect();
        Ok(from_events(events))
    }

    fn del(&self, from: u64, to: u64) -> StorageResult<bool> {
        if from == to {
            return Ok(true);
        }
        let body = self.poster.post(&self.url(&format!("del/{from}:{to}")), &[])?;
        let res: OkRes = parse(&body)?;
        check_error(res.error)?;
        Ok(res.ok)
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A backend living in another process, reached through a [`Poster`].
pub struct RemoteBackend {
    base_url: String,
    poster: Arc<dyn Poster>,
    streams: Mutex<HashMap<String, Arc<RemoteStream>>>,
}

impl RemoteBackend {
    /// Points at the peer exposing its backend under `base_url`.
    ///
    /// Passing `None` for `poster` uses the production HTTP client.
    #[must_use]
    pub fn new(base_url: impl Into<String>, poster: Option<Arc<dyn Poster>>) -> Self {
        Self {
            base_url: base_url.into(),
            poster: poster.unwrap_or_else(|| Arc::new(HttpPoster::new())),
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}", self.base_url, suffix)
    }
}

impl Backend for RemoteBackend {
    fn config(&self) -> StorageResult<serde_json::Value> {
        let body = self.poster.post(&self.url("config"), &[])?;
        let res: ConfigRes = parse(&body)?;
        check_error(res.error)?;
        // wrap the peer's descriptor so ours still round-trips
        Ok(serde_json::json!({
            "type": "http",
            "remote": true,
            "arg": { "url": self.base_url, "base": res.config },
        }))
    }

    fn streams(&self) -> StorageResult<Vec<String>> {
        let body = self.poster.post(&self.url("streams"), &[])?;
        let res: StreamsRes = parse(&body)?;
        check_error(res.error)?;
        Ok(res.streams)
    }

    fn get_stream(&self, name: &str) -> StorageResult<Arc<dyn BackendStream>> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(name.to_string()).or_insert_with(|| {
            Arc::new(RemoteStream {
                base_url: self.url(&format!("streams/{name}")),
                poster: Arc::clone(&self.poster),
            })
        });
        Ok(Arc::clone(stream) as Arc<dyn BackendStream>)
    }

    fn drop_all(&self) -> StorageResult<()> {
        let body = self.poster.post(&self.url("drop"), &[])?;
        let res: ErrorRes = parse(&body)?;
        check_error(res.error)
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
