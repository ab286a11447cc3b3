//! The embedded list-KV backend.
//!
//! Events live in a `redb` database, one table per stream, keyed by the
//! dense 0-based event index. Byte events only. Deletes compact the log
//! by re-indexing the tail, keeping keys dense.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableHandle};

use bytes::Bytes;
use freshet_core::stream::combinators::from_events;
use freshet_core::{BoxStream, Event};

use crate::range;
use crate::{Backend, BackendStream, StorageError, StorageResult};

const DB_FILE: &str = "streams.redb";

fn table_def(name: &str) -> TableDefinition<'_, u64, &'static [u8]> {
    TableDefinition::new(name)
}

/// One stream stored as a dense-keyed table.
#[derive(Debug)]
pub struct KvStream {
    db: Arc<Database>,
    name: String,
}

impl KvStream {
    fn stored_len(&self) -> StorageResult<u64> {
        let txn = self.db.begin_read()?;
        match txn.open_table(table_def(&self.name)) {
            Ok(table) => Ok(table.len()?),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl BackendStream for KvStream {
    fn add(&self, evt: Event) -> StorageResult<()> {
        let bytes = match evt {
            Event::Bytes(bytes) => bytes,
            other => return Err(StorageError::ExpectedBytes { op: "add", got: other.kind() }),
        };
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table_def(&self.name))?;
            let next = table.len()?;
            table.insert(next, bytes.as_ref())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        self.stored_len()
    }

    fn read(&self, from: u64, to: u64) -> StorageResult<BoxStream> {
        if from == to {
            return Ok(from_events(Vec::new()));
        }
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(table_def(&self.name)) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => {
                range::check("read", from, to, 0)?;
                return Ok(from_events(Vec::new()));
            }
            Err(e) => return Err(e.into()),
        };
        range::check("read", from, to, table.len()?)?;

        let mut events = Vec::with_capacity((to - from) as usize);
        for entry in table.range(from..to)? {
            let (_, value) = entry?;
            events.push(Event::Bytes(Bytes::from(value.value().to_vec())));
        }
        Ok(from_events(events))
    }

    fn del(&self, from: u64, to: u64) -> StorageResult<bool> {
        if from == to {
            return Ok(true);
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table_def(&self.name))?;
            let len = table.len()?;
            range::check("del", from, to, len)?;

            // keep the tail, then re-key it down by (to - from)
            let mut tail = Vec::with_capacity((len - to) as usize);
            for entry in table.range(to..len)? {
                let (_, value) = entry?;
                tail.push(value.value().to_vec());
            }
            for key in from..len {
                table.remove(key)?;
            }
            for (offset, value) in tail.iter().enumerate() {
                table.insert(from + offset as u64, value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(true)
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A backend persisting streams in an embedded `redb` database under one
/// directory.
#[derive(Debug)]
pub struct KvBackend {
    dir: PathBuf,
    db: Arc<Database>,
    streams: Mutex<HashMap<String, Arc<KvStream>>>,
}

impl KvBackend {
    /// Opens (creating if necessary) the store under `dir`.
    ///
    /// # Errors
    ///
    /// I/O or database failures while opening.
    pub fn new(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::io("create", dir.display().to_string(), e))?;
        let db = Database::create(dir.join(DB_FILE))?;
        Ok(Self { dir, db: Arc::new(db), streams: Mutex::new(HashMap::new()) })
    }
}

impl Backend for KvBackend {
    fn config(&self) -> StorageResult<serde_json::Value> {
        Ok(serde_json::json!({ "type": "kv", "arg": self.dir.display().to_string() }))
    }

    fn streams(&self) -> StorageResult<Vec<String>> {
        let txn = self.db.begin_read()?;
        let names = txn
            .list_tables()?
            .map(|handle| handle.name().to_string())
            .collect();
        Ok(names)
    }

    fn get_stream(&self, name: &str) -> StorageResult<Arc<dyn BackendStream>> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(name.to_string()).or_insert_with(|| {
            Arc::new(KvStream { db: Arc::clone(&self.db), name: name.to_string() })
        });
        Ok(Arc::clone(stream) as Arc<dyn BackendStream>)
    }

    fn drop_all(&self) -> StorageResult<()> {
        self.streams.lock().clear();
        let txn = self.db.begin_write()?;
        let names: Vec<String> = txn
            .list_tables()?
            .map(|handle| handle.name().to_string())
            .collect();
        for name in names {
            txn.delete_table(table_def(&name))?;
        }
        txn.commit()?;
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

    fn byte_event(s: &str) -> Event {
        Event::Bytes(Bytes::from(s.as_bytes().to_vec()))
    }

    #[test]
    fn append_and_slice() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = KvBackend::new(tmp.path().join("kv")).unwrap();
        let stream = backend.get_stream("s").unwrap();

        for i in 0..4 {
            stream.add(byte_event(&format!("e{i}"))).unwrap();
        }
        assert_eq!(stream.len().unwrap(), 4);

        let mut slice = stream.read(1, 3).unwrap();
        assert_eq!(
            collect(&mut slice).unwrap(),
            vec![byte_event("e1"), byte_event("e2")]
        );
    }

    #[test]
    fn del_keeps_keys_dense() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = KvBackend::new(tmp.path().join("kv")).unwrap();
        let stream = backend.get_stream("s").unwrap();

        for i in 0..5 {
            stream.add(byte_event(&format!("e{i}"))).unwrap();
        }
        assert!(stream.del(1, 3).unwrap());
        assert_eq!(stream.len().unwrap(), 3);

        // appends after the compaction land at the new end
        stream.add(byte_event("e5")).unwrap();
        let mut all = stream.read(0, 4).unwrap();
        assert_eq!(
            collect(&mut all).unwrap(),
            vec![byte_event("e0"), byte_event("e3"), byte_event("e4"), byte_event("e5")]
        );
    }

    #[test]
    fn unknown_stream_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = KvBackend::new(tmp.path().join("kv")).unwrap();
        let stream = backend.get_stream("ghost").unwrap();
        assert_eq!(stream.len().unwrap(), 0);
        assert!(stream.read(0, 0).unwrap().next().unwrap().is_none());
    }

    #[test]
    fn rejects_non_byte_events() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = KvBackend::new(tmp.path().join("kv")).unwrap();
        let stream = backend.get_stream("s").unwrap();
        assert!(stream.add(Event::Str("nope".into())).is_err());
    }

    #[test]
    fn drop_all_clears_every_table() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = KvBackend::new(tmp.path().join("kv")).unwrap();
        backend.get_stream("a").unwrap().add(byte_event("x")).unwrap();
        backend.get_stream("b").unwrap().add(byte_event("y")).unwrap();
        assert_eq!(backend.streams().unwrap().len(), 2);

        backend.drop_all().unwrap();
        assert!(backend.streams().unwrap().is_empty());
    }
}
