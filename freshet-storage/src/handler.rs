//! Server side of the backend wire protocol.
//!
//! [`BackendHandler`] dispatches protocol paths onto any [`Backend`],
//! producing the JSON response bodies the remote backend client expects.
//! It is transport-agnostic: the network server mounts it under
//! `/backends/{name}/`, and tests drive it directly through an
//! in-process [`Poster`](crate::poster::Poster).

use std::sync::Arc;

use tracing::warn;

use freshet_core::{Event, EventStream};

use crate::wire::{ConfigRes, ErrorRes, EventsRes, LenRes, OkRes, StreamsRes};
use crate::{Backend, BackendStream, StorageResult};

/// Serves one backend over the wire protocol.
#[derive(Clone)]
pub struct BackendHandler {
    backend: Arc<dyn Backend>,
}

fn respond<T: serde::Serialize>(result: StorageResult<T>, op: &str) -> Vec<u8> {
    let body = match result {
        Ok(res) => serde_json::to_vec(&res),
        Err(err) => {
            warn!(op, error = %err, "backend request failed");
            serde_json::to_vec(&ErrorRes::err(err.to_string()))
        }
    };
    body.unwrap_or_else(|_| b"{\"error\":\"response encoding failed\"}".to_vec())
}

impl BackendHandler {
    /// Wraps `backend` for protocol dispatch.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Handles one request.
    ///
    /// `path` is relative to the backend mount point (no leading slash),
    /// e.g. `config` or `streams/s/read/0:-1`. Always returns a JSON
    /// response body; failures are reported inside it.
    #[must_use]
    pub fn handle(&self, path: &str, body: &[u8]) -> Vec<u8> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["config"] => respond(self.config(), "config"),
            ["streams"] => respond(self.streams(), "streams"),
            ["drop"] => respond(self.drop_all(), "drop"),
            ["streams", name, "push"] => respond(self.push(name, body), "push"),
            ["streams", name, "read", range] => respond(self.read(name, range), "read"),
            ["streams", name, "del", range] => respond(self.del(name, range), "del"),
            ["streams", name, "len"] => respond(self.len(name), "len"),
            _ => serde_json::to_vec(&ErrorRes::err(format!("no route {path}")))
                .unwrap_or_default(),
        }
    }

    fn config(&self) -> StorageResult<ConfigRes> {
        let config = self.backend.config()?;
        Ok(ConfigRes { config, error: None })
    }

    fn streams(&self) -> StorageResult<StreamsRes> {
        let streams = self.backend.streams()?;
        Ok(StreamsRes { streams, error: None })
    }

    fn drop_all(&self) -> StorageResult<ErrorRes> {
        self.backend.drop_all()?;
        Ok(ErrorRes::ok())
    }

    fn push(&self, name: &str, body: &[u8]) -> StorageResult<ErrorRes> {
        let stream = self.backend.get_stream(name)?;
        stream.add(Event::from(body.to_vec()))?;
        Ok(ErrorRes::ok())
    }

    fn read(&self, name: &str, range: &str) -> StorageResult<EventsRes> {
        let (from, to) = parse_range(range)?;
        let stream = self.backend.get_stream(name)?;
        let (abs_from, abs_to) = stream.interval(from, to)?;
        let mut events = Vec::new();
        let mut slice = stream.read(abs_from, abs_to)?;
        loop {
            match slice.next() {
                Ok(Some(Event::Bytes(bytes))) => {
                    let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                        crate::StorageError::Remote("stored event is not UTF-8 JSON".into())
                    })?;
                    let raw = serde_json::value::RawValue::from_string(text)
                        .map_err(|e| crate::StorageError::Remote(e.to_string()))?;
                    events.push(raw);
                }
                Ok(Some(other)) => {
                    return Err(crate::StorageError::ExpectedBytes {
                        op: "read",
                        got: other.kind(),
                    })
                }
                Ok(None) => break,
                Err(e) => return Err(crate::StorageError::Remote(e.to_string())),
            }
        }
        Ok(EventsRes { events, error: None })
    }

    fn del(&self, name: &str, range: &str) -> StorageResult<OkRes> {
        let (from, to) = parse_range(range)?;
        let stream = self.backend.get_stream(name)?;
        let (abs_from, abs_to) = stream.interval(from, to)?;
        let ok = stream.del(abs_from, abs_to)?;
        Ok(OkRes { ok, error: None })
    }

    fn len(&self, name: &str) -> StorageResult<LenRes> {
        let stream = self.backend.get_stream(name)?;
        Ok(LenRes { len: stream.len()?, error: None })
    }
}

fn parse_range(range: &str) -> StorageResult<(i64, i64)> {
    let bad = || crate::StorageError::Remote(format!("bad range \"{range}\""));
    let (from, to) = range.split_once(':').ok_or_else(bad)?;
    let from: i64 = from.parse().map_err(|_| bad())?;
    let to: i64 = to.parse().map_err(|_| bad())?;
    if from < 0 {
        return Err(bad());
    }
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemBackend;

    fn handler() -> BackendHandler {
        BackendHandler::new(Arc::new(MemBackend::new()))
    }

    #[test]
    fn push_then_len_and_read() {
        let h = handler();
        assert_eq!(h.handle("streams/s/push", b"{\"a\":1}"), b"{}".to_vec());
        assert_eq!(h.handle("streams/s/push", b"{\"a\":2}"), b"{}".to_vec());

        let len: LenRes = serde_json::from_slice(&h.handle("streams/s/len", &[])).unwrap();
        assert_eq!(len.len, 2);

        let read: EventsRes =
            serde_json::from_slice(&h.handle("streams/s/read/0:-1", &[])).unwrap();
        let raw: Vec<&str> = read.events.iter().map(|r| r.get()).collect();
        assert_eq!(raw, vec!["{\"a\":1}", "{\"a\":2}"]);
    }

    #[test]
    fn del_resolves_negative_bounds() {
        let h = handler();
        for i in 0..3 {
            h.handle("streams/s/push", format!("{i}").as_bytes());
        }
        let ok: OkRes = serde_json::from_slice(&h.handle("streams/s/del/1:-1", &[])).unwrap();
        assert!(ok.ok);

        let len: LenRes = serde_json::from_slice(&h.handle("streams/s/len", &[])).unwrap();
        assert_eq!(len.len, 1);
    }

    #[test]
    fn unknown_route_reports_error() {
        let h = handler();
        let res: ErrorRes = serde_json::from_slice(&h.handle("nope", &[])).unwrap();
        assert!(res.error.is_some());
    }

    #[test]
    fn bad_range_reports_error() {
        let h = handler();
        let res: EventsRes =
            serde_json::from_slice(&h.handle("streams/s/read/x:y", &[])).unwrap();
        assert!(res.error.is_some());

        let res: EventsRes =
            serde_json::from_slice(&h.handle("streams/s/read/-1:2", &[])).unwrap();
        assert!(res.error.is_some());
    }

    #[test]
    fn config_round_trips() {
        let h = handler();
        let res: ConfigRes = serde_json::from_slice(&h.handle("config", &[])).unwrap();
        assert_eq!(res.config, serde_json::json!({"type": "mem", "arg": null}));
    }
}
