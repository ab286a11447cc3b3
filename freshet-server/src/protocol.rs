//! Wire envelopes of the event gateway and the admin surface.
//!
//! Gateway messages are JSON objects, one per line. Inbound commands
//! carry a `cmd` discriminator; replies echo the request's `id`;
//! deliveries carry no id and are routed by subscriber id.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Any inbound gateway message.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Command discriminator: `add`, `subscribe` or `unsubscribe`.
    pub cmd: String,
    /// Command payload, parsed per command.
    pub data: Box<RawValue>,
}

/// Payload of `add`: publish one event into a logical stream.
#[derive(Debug, Deserialize)]
pub struct AddData {
    /// Service backend name.
    pub back: String,
    /// Logical stream name.
    pub name: String,
    /// The event, kept as raw JSON.
    pub event: Box<RawValue>,
}

/// Payload of `subscribe`.
#[derive(Debug, Deserialize)]
pub struct SubscribeData {
    /// Request correlation id, echoed in the reply.
    pub id: u32,
    /// Service backend name.
    pub backend: String,
    /// Backend-stream name to subscribe to.
    pub stream: String,
    /// Caller-chosen subscriber id; deliveries carry it.
    pub sid: u32,
    /// History start; negative counts back from `len + 1`.
    pub from: i64,
    /// History end; negative counts back from `len + 1`.
    pub to: i64,
}

/// Payload of `unsubscribe`.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeData {
    /// Request correlation id, echoed in the reply.
    pub id: u32,
    /// Service backend name.
    pub backend: String,
    /// Backend-stream name the subscription was made on.
    pub stream: String,
    /// Subscriber id from the original subscribe.
    pub sid: u32,
}

/// Reply to `subscribe`: the resolved history range, or a failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct RangeReply {
    /// Echo of the request id.
    pub id: u32,
    /// Resolved range or error.
    pub data: RangeData,
}

/// Body of a [`RangeReply`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RangeData {
    /// Absolute history start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    /// Absolute history end; the first live index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<u64>,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply to `unsubscribe`.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkReply {
    /// Echo of the request id.
    pub id: u32,
    /// Outcome or error.
    pub data: OkData,
}

/// Body of an [`OkReply`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OkData {
    /// Whether the subscriber was actually subscribed.
    #[serde(default)]
    pub ok: bool,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One delivered event. No id; `sid` routes it client-side.
#[derive(Debug, Serialize)]
pub struct Delivery<'a> {
    /// Service backend name.
    pub backend: &'a str,
    /// Backend-stream name the event came from.
    pub stream: &'a str,
    /// Subscriber id this delivery is for.
    pub sid: u32,
    /// The event, raw JSON.
    pub data: &'a RawValue,
}

/// Owned mirror of [`Delivery`] for the receive side.
#[derive(Debug, Deserialize)]
pub struct DeliveryOwned {
    /// Service backend name.
    pub backend: String,
    /// Backend-stream name the event came from.
    pub stream: String,
    /// Subscriber id this delivery is for.
    pub sid: u32,
    /// The event, raw JSON.
    pub data: Box<RawValue>,
}

/// Admin: list of service backends.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BackendsRes {
    /// Registered backend names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<String>,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Admin: the streams of one service backend, as parallel arrays.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StreamListRes {
    /// Logical stream names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<String>,
    /// Backend-stream each logical stream feeds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend_streams: Vec<String>,
    /// Pipeline definition of each logical stream.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub definitions: Vec<Vec<serde_json::Value>>,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Admin: arguments of `streams/add`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddStreamArgs {
    /// Backend-stream the new pipeline targets.
    pub bname: String,
    /// The pipeline definition.
    #[serde(default)]
    pub defs: Vec<serde_json::Value>,
}

/// Admin: reply to `streams/get`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GetStreamRes {
    /// Backend-stream the pipeline feeds.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bname: String,
    /// Failure message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
