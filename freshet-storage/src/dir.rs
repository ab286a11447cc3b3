//! The directory backend: one line-per-event append file per stream.
//!
//! Byte events only; a stream named `s` lives in `<dir>/s`, one event per
//! line. Reads scan to the requested index; deletes rewrite the kept
//! lines into a temp file and rename it over the original.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use freshet_core::stream::combinators::from_events;
use freshet_core::{BoxStream, Event};

use crate::range;
use crate::{Backend, BackendStream, StorageError, StorageResult};

/// One append-file stream inside a [`DirBackend`].
#[derive(Debug)]
pub struct DirStream {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DirStream {
    fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    // Counts newline separators without holding lines in memory.
    fn count_lines(&self) -> StorageResult<u64> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::io("len", self.path_str(), e)),
        };
        let mut buf = [0u8; 8192];
        let mut count = 0u64;
        loop {
            let n = file
                .read(&mut buf)
                .map_err(|e| StorageError::io("len", self.path_str(), e))?;
            if n == 0 {
                break;
            }
            count += buf[..n].iter().filter(|b| **b == b'\n').count() as u64;
        }
        Ok(count)
    }
}

impl BackendStream for DirStream {
    fn add(&self, evt: Event) -> StorageResult<()> {
        let bytes = match evt {
            Event::Bytes(bytes) => bytes,
            other => return Err(StorageError::ExpectedBytes { op: "add", got: other.kind() }),
        };
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io("add", self.path_str(), e))?;
        file.write_all(&bytes)
            .and_then(|()| file.write_all(b"\n"))
            .map_err(|e| StorageError::io("add", self.path_str(), e))
    }

    fn len(&self) -> StorageResult<u64> {
        let _guard = self.lock.lock();
        self.count_lines()
    }

    fn read(&self, from: u64, to: u64) -> StorageResult<BoxStream> {
        if from == to {
            return Ok(from_events(Vec::new()));
        }
        let _guard = self.lock.lock();
        range::check("read", from, to, self.count_lines()?)?;

        let file = File::open(&self.path)
            .map_err(|e| StorageError::io("read", self.path_str(), e))?;
        let mut events = Vec::with_capacity((to - from) as usize);
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StorageError::io("read", self.path_str(), e))?;
            let index = index as u64;
            if index >= to {
                break;
            }
            if index >= from {
                events.push(Event::Bytes(Bytes::from(line.into_bytes())));
            }
        }
        Ok(from_events(events))
    }

    fn del(&self, from: u64, to: u64) -> StorageResult<bool> {
        if from == to {
            return Ok(true);
        }
        let _guard = self.lock.lock();
        range::check("del", from, to, self.count_lines()?)?;

        let file = File::open(&self.path)
            .map_err(|e| StorageError::io("del", self.path_str(), e))?;
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".rewrite");
        let tmp_path = PathBuf::from(tmp_name);
        let tmp_str = tmp_path.display().to_string();
        let mut tmp = File::create(&tmp_path)
            .map_err(|e| StorageError::io("del", tmp_str.clone(), e))?;

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StorageError::io("del", self.path_str(), e))?;
            let index = index as u64;
            if index < from || index >= to {
                tmp.write_all(line.as_bytes())
                    .and_then(|()| tmp.write_all(b"\n"))
                    .map_err(|e| StorageError::io("del", tmp_str.clone(), e))?;
            }
        }
        drop(tmp);
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| StorageError::io("del", self.path_str(), e))?;
        Ok(true)
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A backend storing each stream as an append file under one directory.
#[derive(Debug)]
pub struct DirBackend {
    dir: PathBuf,
    streams: Mutex<HashMap<String, Arc<DirStream>>>,
}

impl DirBackend {
    /// Opens (creating if necessary) the directory at `dir`.
    ///
    /// # Errors
    ///
    /// I/O failures creating the directory.
    pub fn new(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::io("create", dir.display().to_string(), e))?;
        Ok(Self { dir, streams: Mutex::new(HashMap::new()) })
    }
}

impl Backend for DirBackend {
    fn config(&self) -> StorageResult<serde_json::Value> {
        Ok(serde_json::json!({ "type": "dir", "arg": self.dir.display().to_string() }))
    }

    fn streams(&self) -> StorageResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StorageError::io("streams", self.dir.display().to_string(), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| StorageError::io("streams", self.dir.display().to_string(), e))?;
            if entry.path().is_dir() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn get_stream(&self, name: &str) -> StorageResult<Arc<dyn BackendStream>> {
        let mut streams = self.streams.lock();
        let stream = streams
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(DirStream::new(self.dir.join(name))));
        Ok(Arc::clone(stream) as Arc<dyn BackendStream>)
    }

    fn drop_all(&self) -> StorageResult<()> {
        self.streams.lock().clear();
        fs::remove_dir_all(&self.dir)
            .map_err(|e| StorageError::io("drop", self.dir.display().to_string(), e))
    }

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshet_core::stream::collect;

    fn byte_event(s: &str) -> Event {
        Event::Bytes(Bytes::from(s.as_bytes().to_vec()))
    }

    #[test]
    fn append_read_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = DirBackend::new(tmp.path().join("events")).unwrap();
        let stream = backend.get_stream("s").unwrap();

        for s in ["{\"a\":1}", "{\"a\":2}", "{\"a\":3}"] {
            stream.add(byte_event(s)).unwrap();
        }
        assert_eq!(stream.len().unwrap(), 3);

        let mut slice = stream.read(1, 3).unwrap();
        assert_eq!(
            collect(&mut slice).unwrap(),
            vec![byte_event("{\"a\":2}"), byte_event("{\"a\":3}")]
        );
    }

    #[test]
    fn rejects_non_byte_events() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = DirBackend::new(tmp.path()).unwrap();
        let stream = backend.get_stream("s").unwrap();
        assert!(matches!(
            stream.add(Event::Num(1.0)),
            Err(StorageError::ExpectedBytes { .. })
        ));
    }

    #[test]
    fn del_rewrites_and_survives_reread() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = DirBackend::new(tmp.path().join("events")).unwrap();
        let stream = backend.get_stream("s").unwrap();

        for i in 0..5 {
            stream.add(byte_event(&format!("e{i}"))).unwrap();
        }
        assert!(stream.del(1, 3).unwrap());
        assert_eq!(stream.len().unwrap(), 3);

        let mut rest = stream.read(0, 3).unwrap();
        assert_eq!(
            collect(&mut rest).unwrap(),
            vec![byte_event("e0"), byte_event("e3"), byte_event("e4")]
        );

        // the rewritten file accepts further appends at the right index
        stream.add(byte_event("e5")).unwrap();
        assert_eq!(stream.len().unwrap(), 4);
    }

    #[test]
    fn missing_file_means_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = DirBackend::new(tmp.path().join("events")).unwrap();
        let stream = backend.get_stream("never-written").unwrap();
        assert_eq!(stream.len().unwrap(), 0);
        assert!(stream.read(0, 1).is_err());
    }

    #[test]
    fn streams_lists_files() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = DirBackend::new(tmp.path().join("events")).unwrap();
        backend.get_stream("a").unwrap().add(byte_event("x")).unwrap();
        backend.get_stream("b").unwrap().add(byte_event("y")).unwrap();
        let mut names = backend.streams().unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
