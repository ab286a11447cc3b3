//! The remote backend against an in-process peer: every operation goes
//! through the wire protocol and back without touching a socket.

use std::sync::Arc;

use freshet_core::stream::collect;
use freshet_core::Event;
use freshet_storage::handler::BackendHandler;
use freshet_storage::http::RemoteBackend;
use freshet_storage::mem::MemBackend;
use freshet_storage::poster::Poster;
use freshet_storage::{Backend, BackendStream, StorageError, StorageResult};

const BASE: &str = "local://peer";

/// Routes posts for `local://peer/...` straight into a handler.
struct LocalPoster {
    handler: BackendHandler,
}

impl Poster for LocalPoster {
    fn post(&self, url: &str, body: &[u8]) -> StorageResult<Vec<u8>> {
        let path = url
            .strip_prefix(BASE)
            .ok_or_else(|| StorageError::Remote(format!("unexpected url {url}")))?;
        Ok(self.handler.handle(path, body))
    }
}

fn remote() -> RemoteBackend {
    let peer: Arc<dyn Backend> = Arc::new(MemBackend::new());
    let poster: Arc<dyn Poster> = Arc::new(LocalPoster { handler: BackendHandler::new(peer) });
    RemoteBackend::new(BASE, Some(poster))
}

fn byte_event(s: &str) -> Event {
    Event::from(s.as_bytes().to_vec())
}

#[test]
fn push_len_read_del() {
    let backend = remote();
    let stream = backend.get_stream("s").unwrap();

    for i in 0..4 {
        stream.add(byte_event(&format!("{{\"i\":{i}}}"))).unwrap();
    }
    assert_eq!(stream.len().unwrap(), 4);

    let mut slice = stream.read(1, 3).unwrap();
    assert_eq!(
        collect(&mut slice).unwrap(),
        vec![byte_event("{\"i\":1}"), byte_event("{\"i\":2}")]
    );

    assert!(stream.del(0, 2).unwrap());
    assert_eq!(stream.len().unwrap(), 2);
}

#[test]
fn interval_resolves_against_remote_len() {
    let backend = remote();
    let stream = backend.get_stream("s").unwrap();
    for i in 0..4 {
        stream.add(byte_event(&format!("{i}"))).unwrap();
    }
    assert_eq!(stream.interval(1, -1).unwrap(), (1, 4));
}

#[test]
fn non_byte_events_are_rejected_client_side() {
    let backend = remote();
    let stream = backend.get_stream("s").unwrap();
    assert!(matches!(
        stream.add(Event::Num(3.0)),
        Err(StorageError::ExpectedBytes { .. })
    ));
}

#[test]
fn config_wraps_the_peer_descriptor() {
    let backend = remote();
    let config = backend.config().unwrap();
    assert_eq!(config["type"], "http");
    assert_eq!(config["remote"], true);
    assert_eq!(config["arg"]["url"], BASE);
    assert_eq!(config["arg"]["base"], serde_json::json!({"type": "mem", "arg": null}));
}

#[test]
fn range_errors_cross_the_wire() {
    let backend = remote();
    let stream = backend.get_stream("s").unwrap();
    stream.add(byte_event("only")).unwrap();
    assert!(matches!(stream.read(0, 5), Err(StorageError::Remote(_))));
}

#[test]
fn streams_and_drop() {
    let backend = remote();
    backend.get_stream("a").unwrap().add(byte_event("1")).unwrap();
    backend.get_stream("b").unwrap().add(byte_event("2")).unwrap();

    let mut names = backend.streams().unwrap();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);

    backend.drop_all().unwrap();
    assert!(backend.streams().unwrap().is_empty());
}
