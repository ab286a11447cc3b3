//! The in-memory backend.
//!
//! Stores any event kind, making it the backend of choice for tests and
//! for pipelines whose output is not byte-encoded.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use freshet_core::stream::combinators::from_events;
use freshet_core::{BoxStream, Event};

use crate::range;
use crate::{Backend, BackendStream, StorageResult};

/// An in-memory event log guarded by a per-stream mutex.
#[derive(Debug, Default)]
pub struct MemStream {
    events: Mutex<Vec<Event>>,
}

impl BackendStream for MemStream {
    fn add(&self, evt: Event) -> StorageResult<()> {
        self.events.lock().push(evt);
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.events.lock().len() as u64)
    }

    fn read(&self, from: u64, to: u64) -> StorageResult<BoxStream> {
        let events = self.events.lock();
        range::check("read", from, to, events.len() as u64)?;
        Ok(from_events(events[from as usize..to as usize].to_vec()))
    }

    fn del(&self, from: u64, to: u64) -> StorageResult<bool> {
        let mut events = self.events.lock();
        range::check("del", from, to, events.len() as u64)?;
        events.drain(from as usize..to as usize);
        Ok(true)
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A backend whose streams live entirely in process memory.
#[derive(Debug, Default)]
pub struct MemBackend {
    streams: Mutex<HashMap<String, Arc<MemStream>>>,
}

impl MemBackend {
    /// Creates an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemBackend {
    fn config(&self) -> StorageResult<serde_json::Value> {
        Ok(serde_json::json!({ "type": "mem", "arg": null }))
    }

    fn streams(&self) -> StorageResult<Vec<String>> {
        Ok(self.streams.lock().keys().cloned().collect())
    }

    fn get_stream(&self, name: &str) -> StorageResult<Arc<dyn BackendStream>> {
        let mut streams = self.streams.lock();
        let stream = streams
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemStream::default()));
        Ok(Arc::clone(stream) as Arc<dyn BackendStream>)
    }

    fn drop_all(&self) -> StorageResult<()> {
        self.streams.lock().clear();
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshet_core::stream::collect;
    use freshet_core::EventStream;

    #[test]
    fn append_then_slice() {
        let backend = MemBackend::new();
        let stream = backend.get_stream("s").unwrap();
        for i in 0..5 {
            stream.add(Event::Num(f64::from(i))).unwrap();
        }
        assert_eq!(stream.len().unwrap(), 5);

        let mut slice = stream.read(1, 4).unwrap();
        assert_eq!(
            collect(&mut slice).unwrap(),
            vec![Event::Num(1.0), Event::Num(2.0), Event::Num(3.0)]
        );
    }

    #[test]
    fn get_stream_is_idempotent() {
        let backend = MemBackend::new();
        let a = backend.get_stream("s").unwrap();
        a.add(Event::Bool(true)).unwrap();
        let b = backend.get_stream("s").unwrap();
        assert_eq!(b.len().unwrap(), 1);
    }

    #[test]
    fn del_compacts() {
        let backend = MemBackend::new();
        let stream = backend.get_stream("s").unwrap();
        for i in 0..4 {
            stream.add(Event::Num(f64::from(i))).unwrap();
        }
        assert!(stream.del(1, 3).unwrap());
        assert_eq!(stream.len().unwrap(), 2);
        let mut rest = stream.read(0, 2).unwrap();
        assert_eq!(
            collect(&mut rest).unwrap(),
            vec![Event::Num(0.0), Event::Num(3.0)]
        );
    }

    #[test]
    fn empty_ranges_are_noops() {
        let backend = MemBackend::new();
        let stream = backend.get_stream("s").unwrap();
        stream.add(Event::Null).unwrap();
        assert!(stream.read(1, 1).unwrap().next().unwrap().is_none());
        assert!(stream.del(0, 0).unwrap());
        assert_eq!(stream.len().unwrap(), 1);
    }

    #[test]
    fn interval_resolves_negatives() {
        let backend = MemBackend::new();
        let stream = backend.get_stream("s").unwrap();
        for i in 0..4 {
            stream.add(Event::Num(f64::from(i))).unwrap();
        }
        assert_eq!(stream.interval(1, -1).unwrap(), (1, 4));
        assert_eq!(stream.interval(2, 2).unwrap(), (0, 0));
        assert!(stream.interval(5, -1).is_err());
    }

    #[test]
    fn drop_all_forgets_streams() {
        let backend = MemBackend::new();
        backend.get_stream("a").unwrap();
        backend.get_stream("b").unwrap();
        assert_eq!(backend.streams().unwrap().len(), 2);
        backend.drop_all().unwrap();
        assert!(backend.streams().unwrap().is_empty());
    }
}
