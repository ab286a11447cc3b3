//! Byte-level event conversion.
//!
//! Pipelines move between raw payloads and structured events through
//! named encoders and decoders. The registry is an explicit value handed
//! to the pipeline compiler rather than process-global state, so tests
//! and embedders can carry their own codec sets.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::event::Event;

/// Encodes an event into its byte form.
pub trait Encoder: Send + Sync {
    /// Produces the byte form of `evt`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] when the event has no representation in
    /// this encoding.
    fn encode(&self, evt: &Event) -> Result<Bytes>;
}

/// Decodes an event from its byte form.
pub trait Decoder: Send + Sync {
    /// Parses an event out of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] when the bytes are not valid for this
    /// encoding.
    fn decode(&self, data: &[u8]) -> Result<Event>;
}

/// The JSON encoder.
///
/// Byte events pass through unchanged: an already-encoded payload is not
/// wrapped a second time.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, evt: &Event) -> Result<Bytes> {
        if let Event::Bytes(bytes) = evt {
            return Ok(bytes.clone());
        }
        let value = evt.to_json()?;
        serde_json::to_vec(&value)
            .map(Bytes::from)
            .map_err(|e| Error::Codec(e.to_string()))
    }
}

/// The JSON decoder. Numbers widen to `f64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, data: &[u8]) -> Result<Event> {
        serde_json::from_slice::<serde_json::Value>(data)
            .map(Event::from)
            .map_err(|e| Error::Codec(e.to_string()))
    }
}

/// Named encoders and decoders available to compiled pipelines.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    encoders: HashMap<String, Arc<dyn Encoder>>,
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl CodecRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry carrying the codecs this library ships: `json`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_encoder("json", Arc::new(JsonEncoder));
        registry.register_decoder("json", Arc::new(JsonDecoder));
        registry
    }

    /// Registers (or replaces) an encoder under `name`.
    pub fn register_encoder(&mut self, name: &str, encoder: Arc<dyn Encoder>) {
        self.encoders.insert(name.to_string(), encoder);
    }

    /// Registers (or replaces) a decoder under `name`.
    pub fn register_decoder(&mut self, name: &str, decoder: Arc<dyn Decoder>) {
        self.decoders.insert(name.to_string(), decoder);
    }

    /// Looks up an encoder by name.
    #[must_use]
    pub fn encoder(&self, name: &str) -> Option<Arc<dyn Encoder>> {
        self.encoders.get(name).cloned()
    }

    /// Looks up a decoder by name.
    #[must_use]
    pub fn decoder(&self, name: &str) -> Option<Arc<dyn Decoder>> {
        self.decoders.get(name).cloned()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("encoders", &self.encoders.keys().collect::<Vec<_>>())
            .field("decoders", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip() {
        let evt = Event::from(json!({"a": 1, "b": [true, "x"]}));
        let bytes = JsonEncoder.encode(&evt).unwrap();
        assert_eq!(JsonDecoder.decode(&bytes).unwrap(), evt);
    }

    #[test]
    fn encoder_passes_bytes_through() {
        let raw = Bytes::from_static(b"{\"done\":true}");
        let out = JsonEncoder.encode(&Event::Bytes(raw.clone())).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn decoder_rejects_garbage() {
        assert!(JsonDecoder.decode(b"{not json").is_err());
    }

    #[test]
    fn registry_defaults_carry_json() {
        let registry = CodecRegistry::with_defaults();
        assert!(registry.encoder("json").is_some());
        assert!(registry.decoder("json").is_some());
        assert!(registry.encoder("protobuf").is_none());
    }
}
