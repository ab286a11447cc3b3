//! The discarding backend: accepts everything, stores nothing.

use std::sync::Arc;

use freshet_core::stream::combinators::empty;
use freshet_core::{BoxStream, Event};

use crate::range;
use crate::{Backend, BackendStream, StorageResult};

/// A stream that discards appended events and is always empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStream;

impl BackendStream for NullStream {
    fn add(&self, _evt: Event) -> StorageResult<()> {
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(0)
    }

    fn read(&self, from: u64, to: u64) -> StorageResult<BoxStream> {
        range::check("read", from, to, 0)?;
        Ok(empty())
    }

    fn del(&self, from: u64, to: u64) -> StorageResult<bool> {
        range::check("del", from, to, 0)?;
        Ok(true)
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A backend whose every stream is a [`NullStream`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl NullBackend {
    /// Creates the discarding backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Backend for NullBackend {
    fn config(&self) -> StorageResult<serde_json::Value> {
        Ok(serde_json::json!({ "type": "nil", "arg": null }))
    }

    fn streams(&self) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn get_stream(&self, _name: &str) -> StorageResult<Arc<dyn BackendStream>> {
        Ok(Arc::new(NullStream))
    }

    fn drop_all(&self) -> StorageResult<()> {
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshet_core::EventStream;

    #[test]
    fn discards_and_stays_empty() {
        let backend = NullBackend::new();
        let stream = backend.get_stream("anything").unwrap();
        stream.add(Event::Num(1.0)).unwrap();
        assert_eq!(stream.len().unwrap(), 0);
        assert!(stream.read(0, 0).unwrap().next().unwrap().is_none());
        assert!(stream.del(0, 1).is_err());
    }

    #[test]
    fn config_descriptor() {
        let backend = NullBackend::new();
        assert_eq!(
            backend.config().unwrap(),
            serde_json::json!({ "type": "nil", "arg": null })
        );
    }
}
