//! One full-duplex protocol session.
//!
//! A [`Session`] owns the subscriber table of a single connection and
//! translates inbound envelopes into service calls. Outbound messages
//! (replies and deliveries) go through an unbounded queue the transport
//! drains; the session never blocks on the peer.
//!
//! Subscribe couples history with the live tail: the buffered sink is
//! registered first, then the resolved range is replayed from storage
//! through the direct path while live events queue up, then the sink
//! goes live. The replay runs on its own thread so the session keeps
//! processing commands.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use freshet_core::{Event, EventSink};
use freshet_service::subscriber::{replay, BufferedSink};
use freshet_service::{Service, ServiceBackend};
use freshet_storage::{Backend, BackendStream};

use crate::error::{ServerError, ServerResult};
use crate::protocol::{
    AddData, Delivery, Envelope, OkData, OkReply, RangeData, RangeReply, SubscribeData,
    UnsubscribeData,
};

/// Sends delivery envelopes for one subscriber id into the outbound
/// queue.
pub struct WireSink {
    backend: String,
    stream: String,
    sid: u32,
    outbound: UnboundedSender<Vec<u8>>,
}

impl EventSink for WireSink {
    fn add(&self, evt: Event) -> freshet_core::Result<()> {
        let bytes = match evt {
            Event::Bytes(bytes) => bytes,
            other => {
                return Err(freshet_core::Error::Sink(format!(
                    "delivery needs a byte event, got {}",
                    other.kind()
                )))
            }
        };
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| freshet_core::Error::Sink("event is not UTF-8 JSON".into()))?;
        let raw = serde_json::value::RawValue::from_string(text)
            .map_err(|e| freshet_core::Error::Sink(e.to_string()))?;
        let delivery = Delivery {
            backend: &self.backend,
            stream: &self.stream,
            sid: self.sid,
            data: &*raw,
        };
        let message = serde_json::to_vec(&delivery)
            .map_err(|e| freshet_core::Error::Sink(e.to_string()))?;
        self.outbound
            .send(message)
            .map_err(|_| freshet_core::Error::Sink("connection gone".into()))
    }

    fn close(&self) -> freshet_core::Result<()> {
        Ok(())
    }
}

struct SubEntry {
    backend: String,
    bstream: String,
    handle: Arc<dyn EventSink>,
}

/// The protocol state of one connection.
pub struct Session {
    service: Arc<Service>,
    outbound: UnboundedSender<Vec<u8>>,
    subs: Mutex<HashMap<u32, SubEntry>>,
}

impl Session {
    /// Creates a session pushing outbound messages into `outbound`.
    #[must_use]
    pub fn new(service: Arc<Service>, outbound: UnboundedSender<Vec<u8>>) -> Self {
        Self { service, outbound, subs: Mutex::new(HashMap::new()) }
    }

    /// Handles one inbound message.
    ///
    /// Publish failures are logged, not fatal; subscribe/unsubscribe
    /// failures are reported to the peer in the reply.
    ///
    /// # Errors
    ///
    /// Only protocol violations (unparseable JSON, unknown command);
    /// the transport should drop the connection on those.
    pub fn handle_message(&self, message: &[u8]) -> ServerResult<()> {
        let envelope: Envelope = serde_json::from_slice(message)
            .map_err(|e| ServerError::BadMessage(e.to_string()))?;
        match envelope.cmd.as_str() {
            "add" => {
                let data: AddData = parse(&envelope.data)?;
                if let Err(err) = self.publish(&data) {
                    warn!(back = %data.back, stream = %data.name, error = %err, "publish failed");
                }
                Ok(())
            }
            "subscribe" => {
                let data: SubscribeData = parse(&envelope.data)?;
                let id = data.id;
                if let Err(err) = self.subscribe(data) {
                    self.send(&RangeReply {
                        id,
                        data: RangeData { error: Some(err.to_string()), ..RangeData::default() },
                    });
                }
                Ok(())
            }
            "unsubscribe" => {
                let data: UnsubscribeData = parse(&envelope.data)?;
                let id = data.id;
                let reply = match self.unsubscribe(&data) {
                    Ok(ok) => OkReply { id, data: OkData { ok, error: None } },
                    Err(err) => OkReply {
                        id,
                        data: OkData { ok: false, error: Some(err.to_string()) },
                    },
                };
                self.send(&reply);
                Ok(())
            }
            other => Err(ServerError::UnknownCommand(other.to_string())),
        }
    }

    /// Unsubscribes everything this session still owns.
    ///
    /// The transport calls this when it notices the disconnect.
    pub fn close(&self) {
        let entries: Vec<(u32, SubEntry)> = self.subs.lock().drain().collect();
        for (sid, entry) in entries {
            match self.service.get_backend(&entry.backend) {
                Ok(backend) => {
                    if let Err(err) = backend.rm_sub(&entry.bstream, &entry.handle) {
                        debug!(sid, error = %err, "cleanup unsubscribe failed");
                    }
                }
                Err(err) => debug!(sid, error = %err, "cleanup skipped"),
            }
        }
    }

    fn publish(&self, data: &AddData) -> ServerResult<()> {
        let backend = self.service.get_backend(&data.back)?;
        let (pipeline, _) = backend.get_stream(&data.name)?;
        let event = Event::from(data.event.get().as_bytes().to_vec());
        pipeline.add(event)?;
        Ok(())
    }

    fn subscribe(&self, data: SubscribeData) -> ServerResult<()> {
        let backend = self.service.get_backend(&data.backend)?;
        let sink = Arc::new(BufferedSink::new(WireSink {
            backend: data.backend.clone(),
            stream: data.stream.clone(),
            sid: data.sid,
            outbound: self.outbound.clone(),
        }));
        let handle: Arc<dyn EventSink> = Arc::clone(&sink) as Arc<dyn EventSink>;

        self.subs.lock().insert(
            data.sid,
            SubEntry {
                backend: data.backend.clone(),
                bstream: data.stream.clone(),
                handle: Arc::clone(&handle),
            },
        );

        let (from, to) = match backend.add_sub(&data.stream, handle, data.from, data.to) {
            Ok(range) => range,
            Err(err) => {
                self.subs.lock().remove(&data.sid);
                return Err(err.into());
            }
        };

        // the resolved range goes out before any history delivery
        self.send(&RangeReply {
            id: data.id,
            data: RangeData { from: Some(from), to: Some(to), error: None },
        });

        // replay off-thread so the command loop keeps moving; live
        // events queue in the buffered sink meanwhile
        let stream_name = data.stream;
        std::thread::spawn(move || {
            if let Err(err) = replay_history(&backend, &stream_name, from, to, &sink) {
                warn!(stream = %stream_name, error = %err, "history replay failed");
            }
            sink.start();
        });

        Ok(())
    }

    fn unsubscribe(&self, data: &UnsubscribeData) -> ServerResult<bool> {
        let backend = self.service.get_backend(&data.backend)?;
        let Some(entry) = self.subs.lock().remove(&data.sid) else {
            return Ok(false);
        };
        Ok(backend.rm_sub(&entry.bstream, &entry.handle)?)
    }

    fn send<T: serde::Serialize>(&self, message: &T) {
        match serde_json::to_vec(message) {
            Ok(bytes) => {
                if self.outbound.send(bytes).is_err() {
                    debug!("reply dropped, connection gone");
                }
            }
            Err(err) => warn!(error = %err, "reply encoding failed"),
        }
    }
}

fn parse<'a, T: serde::Deserialize<'a>>(
    raw: &'a serde_json::value::RawValue,
) -> ServerResult<T> {
    serde_json::from_str(raw.get()).map_err(|e| ServerError::BadMessage(e.to_string()))
}

fn replay_history(
    backend: &Arc<ServiceBackend>,
    bstream: &str,
    from: u64,
    to: u64,
    sink: &BufferedSink<WireSink>,
) -> ServerResult<()> {
    let store = backend.backend().get_stream(bstream).map_err(freshet_service::ServiceError::from)?;
    let mut history = store.read(from, to).map_err(freshet_service::ServiceError::from)?;
    replay(&mut history, sink).map_err(freshet_service::ServiceError::from)?;
    Ok(())
}
