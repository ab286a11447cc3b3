//! The opaque event value passing through the system.
//!
//! Events are never interpreted by the runtime itself; only the
//! combinators that need structure (field access, comparisons, codecs)
//! look inside, and they fail with a shape error when the event does not
//! have the form they require. All JSON numeric widths widen to `f64`.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::{Error, Result};

/// A single datum flowing through streams, pipelines and backends.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Event {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number; integers widen to `f64`.
    Num(f64),
    /// A UTF-8 string.
    Str(String),
    /// An opaque byte payload, typically an encoded event.
    Bytes(Bytes),
    /// An ordered sequence of events.
    Arr(Vec<Event>),
    /// A string-keyed map of events.
    Obj(HashMap<String, Event>),
}

impl Event {
    /// Short name of this event's kind, used in shape errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Num(_) => "number",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Arr(_) => "array",
            Self::Obj(_) => "object",
        }
    }

    /// The numeric value, if this event is a number.
    #[must_use]
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean value, if this event is a bool.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string value, if this event is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The byte payload, if this event is raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Looks up a dotted path such as `"object.value.data"`.
    ///
    /// The empty path resolves to the event itself. Returns `None` if any
    /// traversed segment is missing or a non-map value is reached before
    /// the path ends.
    #[must_use]
    pub fn path(&self, path: &str) -> Option<&Event> {
        if path.is_empty() {
            return Some(self);
        }
        let mut current = self;
        for segment in path.split('.') {
            match current {
                Self::Obj(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Returns a copy of this event with `path` set to `value`.
    ///
    /// Missing intermediate maps are created. The empty path replaces the
    /// whole event. If an existing segment along the path is not a map
    /// the event is returned unchanged.
    #[must_use]
    pub fn with_path(&self, path: &str, value: Event) -> Event {
        if path.is_empty() {
            return value;
        }
        let segments: Vec<&str> = path.split('.').collect();
        set_path(self, &segments, value).unwrap_or_else(|| self.clone())
    }

    /// Converts this event into a JSON value.
    ///
    /// # Errors
    ///
    /// Raw [`Event::Bytes`] (at any depth) and non-finite numbers have no
    /// JSON representation and yield [`Error::Codec`].
    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value;
        match self {
            Self::Null => Ok(Value::Null),
            Self::Bool(b) => Ok(Value::Bool(*b)),
            Self::Num(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .ok_or_else(|| Error::Codec(format!("non-finite number {n}"))),
            Self::Str(s) => Ok(Value::String(s.clone())),
            Self::Bytes(_) => Err(Error::Codec("raw bytes have no JSON form".to_string())),
            Self::Arr(items) => items.iter().map(Event::to_json).collect::<Result<_>>().map(Value::Array),
            Self::Obj(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json()?);
                }
                Ok(Value::Object(out))
            }
        }
    }
}

fn set_path(event: &Event, segments: &[&str], value: Event) -> Option<Event> {
    let Event::Obj(map) = event else {
        return None;
    };
    let mut out = map.clone();
    let head = segments[0];
    if segments.len() == 1 {
        out.insert(head.to_string(), value);
        return Some(Event::Obj(out));
    }
    let updated = match map.get(head) {
        Some(child) => set_path(child, &segments[1..], value)?,
        None => set_path(&Event::Obj(HashMap::new()), &segments[1..], value)?,
    };
    out.insert(head.to_string(), updated);
    Some(Event::Obj(out))
}

impl From<bool> for Event {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Event {
    fn from(v: f64) -> Self {
        Self::Num(v)
    }
}

impl From<i64> for Event {
    fn from(v: i64) -> Self {
        Self::Num(v as f64)
    }
}

impl From<&str> for Event {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Event {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Bytes> for Event {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<u8>> for Event {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<serde_json::Value> for Event {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Num(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::Arr(items.into_iter().map(Event::from).collect()),
            Value::Object(map) => {
                Self::Obj(map.into_iter().map(|(k, v)| (k, Event::from(v))).collect())
            }
        }
    }
}
