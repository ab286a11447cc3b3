//! The admin and raw-backend HTTP surface.
//!
//! A deliberately small HTTP/1.1 POST responder: request line, headers,
//! `Content-Length` body, one JSON response. The interesting work is in
//! the route table; everything under `/backends/{name}/` forwards to the
//! storage wire handler, and `/sbackends/...` manages service backends
//! and their streams.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use freshet_service::Service;
use freshet_storage::handler::BackendHandler;
use freshet_storage::registry::BackendRegistry;
use freshet_storage::wire::ErrorRes;
use freshet_storage::Backend;

use crate::error::ServerResult;
use crate::protocol::{AddStreamArgs, BackendsRes, GetStreamRes, StreamListRes};

/// Shared state of the HTTP surface.
pub struct AdminState {
    service: Arc<Service>,
    registry: BackendRegistry,
}

impl AdminState {
    /// Bundles the service and the backend registry used by
    /// `/sbackends/add`.
    #[must_use]
    pub fn new(service: Arc<Service>, registry: BackendRegistry) -> Self {
        Self { service, registry }
    }

    /// Dispatches one request, always producing a JSON response body.
    #[must_use]
    pub fn dispatch(&self, path: &str, body: &[u8]) -> Vec<u8> {
        if let Some(rest) = path.strip_prefix("/backends/") {
            return match rest.split_once('/') {
                Some((back, tail)) => match self.service.get_backend(back) {
                    Ok(sb) => BackendHandler::new(sb.backend()).handle(tail, body),
                    Err(err) => encode(&ErrorRes::err(err.to_string())),
                },
                None => encode(&ErrorRes::err(format!("no route /backends/{rest}"))),
            };
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["sbackends"] => encode(&BackendsRes {
                backends: self.service.backends(),
                error: None,
            }),
            ["sbackends", "add", back] => self.add_backend(back, body),
            ["sbackends", "get", back] => match self.service.get_backend(back) {
                Ok(_) => encode(&ErrorRes::ok()),
                Err(err) => encode(&ErrorRes::err(err.to_string())),
            },
            ["sbackends", "rm", back] => self.rm_backend(back),
            ["sbackends", back, "streams"] => self.list_streams(back),
            ["sbackends", back, "streams", "add", name] => self.add_stream(back, name, body),
            ["sbackends", back, "streams", "get", name] => self.get_stream(back, name),
            ["sbackends", back, "streams", "rm", name] => self.rm_stream(back, name),
            _ => encode(&ErrorRes::err(format!("no route {path}"))),
        }
    }

    fn add_backend(&self, back: &str, body: &[u8]) -> Vec<u8> {
        let config: serde_json::Value = match serde_json::from_slice(body) {
            Ok(config) => config,
            Err(err) => return encode(&ErrorRes::err(format!("bad descriptor: {err}"))),
        };
        let backend = match self.registry.from_config(&config) {
            Ok(backend) => backend,
            Err(err) => return encode(&ErrorRes::err(err.to_string())),
        };
        match self.service.add_backend(back, backend) {
            Ok(_) => encode(&ErrorRes::ok()),
            Err(err) => encode(&ErrorRes::err(err.to_string())),
        }
    }

    fn rm_backend(&self, back: &str) -> Vec<u8> {
        let storage = match self.service.get_backend(back) {
            Ok(sb) => Some(sb.backend()),
            Err(_) => None,
        };
        match self.service.rm_backend(back) {
            Ok(()) => {
                if let Some(storage) = storage {
                    if let Err(err) = storage.close() {
                        warn!(back, error = %err, "backend close failed");
                    }
                }
                encode(&ErrorRes::ok())
            }
            Err(err) => encode(&ErrorRes::err(err.to_string())),
        }
    }

    fn list_streams(&self, back: &str) -> Vec<u8> {
        match self.service.get_backend(back) {
            Ok(sb) => {
                let (streams, backend_streams, definitions) = sb.streams();
                encode(&StreamListRes { streams, backend_streams, definitions, error: None })
            }
            Err(err) => encode(&StreamListRes {
                error: Some(err.to_string()),
                ..StreamListRes::default()
            }),
        }
    }

    fn add_stream(&self, back: &str, name: &str, body: &[u8]) -> Vec<u8> {
        let args: AddStreamArgs = match serde_json::from_slice(body) {
            Ok(args) => args,
            Err(err) => return encode(&ErrorRes::err(format!("bad arguments: {err}"))),
        };
        let result = self
            .service
            .get_backend(back)
            .and_then(|sb| sb.add_stream(&args.bname, name, args.defs).map(|_| ()));
        match result {
            Ok(()) => encode(&ErrorRes::ok()),
            Err(err) => encode(&ErrorRes::err(err.to_string())),
        }
    }

    fn get_stream(&self, back: &str, name: &str) -> Vec<u8> {
        let result = self
            .service
            .get_backend(back)
            .and_then(|sb| sb.get_stream(name));
        match result {
            Ok((_, bname)) => encode(&GetStreamRes { bname, error: None }),
            Err(err) => encode(&GetStreamRes {
                error: Some(err.to_string()),
                ..GetStreamRes::default()
            }),
        }
    }

    fn rm_stream(&self, back: &str, name: &str) -> Vec<u8> {
        let result = self
            .service
            .get_backend(back)
            .and_then(|sb| sb.rm_stream(name));
        match result {
            Ok(()) => encode(&ErrorRes::ok()),
            Err(err) => encode(&ErrorRes::err(err.to_string())),
        }
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|_| b"{\"error\":\"encoding failed\"}".to_vec())
}

/// Serves the admin surface on `listener` until `shutdown` fires.
///
/// # Errors
///
/// Accept-loop failures; per-connection failures are logged.
pub async fn run(
    state: Arc<AdminState>,
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> ServerResult<()> {
    info!(addr = %listener.local_addr()?, "admin surface listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(state, stream).await {
                        debug!(%peer, error = %err, "admin connection failed");
                    }
                });
            }
            _ = shutdown.recv() => {
                info!("admin surface shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(state: Arc<AdminState>, stream: TcpStream) -> ServerResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let Some((path, body)) = read_request(&mut reader).await? else {
            return Ok(());
        };
        let state = Arc::clone(&state);
        let response =
            tokio::task::spawn_blocking(move || state.dispatch(&path, &body))
                .await
                .unwrap_or_else(|_| encode(&ErrorRes::err("handler panicked")));

        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
            response.len()
        );
        write_half.write_all(head.as_bytes()).await?;
        write_half.write_all(&response).await?;
        write_half.flush().await?;
    }
}

// Parses one "POST <path> HTTP/1.1" request with an optional
// Content-Length body. Returns None on a cleanly closed connection.
async fn read_request(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
) -> ServerResult<Option<(String, Vec<u8>)>> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 {
        return Ok(None);
    }
    let mut parts = request_line.split_whitespace();
    let _method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).await? == 0 {
            return Ok(None);
        }
        let header = header.trim();
        if header.is_empty() {
            break;
        }
        if let Some(value) = header
            .to_ascii_lowercase()
            .strip_prefix("content-length:")
            .map(str::trim)
        {
            content_length = value.parse().unwrap_or(0);
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;
    Ok(Some((path, body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshet_service::DeliveryMode;
    use serde_json::json;

    fn state() -> AdminState {
        AdminState::new(
            Arc::new(Service::new(DeliveryMode::Sync)),
            BackendRegistry::with_defaults(),
        )
    }

    #[test]
    fn backend_lifecycle_over_the_admin_surface() {
        let state = state();

        let res = state.dispatch("/sbackends/add/b", br#"{"type":"mem","arg":null}"#);
        assert_eq!(res, b"{}".to_vec());

        let list: BackendsRes =
            serde_json::from_slice(&state.dispatch("/sbackends", &[])).unwrap();
        assert_eq!(list.backends, vec!["b"]);

        assert_eq!(state.dispatch("/sbackends/get/b", &[]), b"{}".to_vec());
        assert_eq!(state.dispatch("/sbackends/rm/b", &[]), b"{}".to_vec());

        let gone: ErrorRes =
            serde_json::from_slice(&state.dispatch("/sbackends/get/b", &[])).unwrap();
        assert!(gone.error.is_some());
    }

    #[test]
    fn stream_lifecycle_over_the_admin_surface() {
        let state = state();
        state.dispatch("/sbackends/add/b", br#"{"type":"mem","arg":null}"#);

        let args = json!({"bname": "raw", "defs": [{"get_field": ["input", "x"]}]});
        let res = state.dispatch(
            "/sbackends/b/streams/add/p",
            serde_json::to_vec(&args).unwrap().as_slice(),
        );
        assert_eq!(res, b"{}".to_vec());

        let got: GetStreamRes =
            serde_json::from_slice(&state.dispatch("/sbackends/b/streams/get/p", &[])).unwrap();
        assert_eq!(got.bname, "raw");

        let listing: StreamListRes =
            serde_json::from_slice(&state.dispatch("/sbackends/b/streams", &[])).unwrap();
        assert_eq!(listing.streams, vec!["p"]);
        assert_eq!(listing.backend_streams, vec!["raw"]);

        assert_eq!(state.dispatch("/sbackends/b/streams/rm/p", &[]), b"{}".to_vec());
        let gone: GetStreamRes =
            serde_json::from_slice(&state.dispatch("/sbackends/b/streams/get/p", &[])).unwrap();
        assert!(gone.error.is_some());
    }

    #[test]
    fn raw_backend_surface_forwards_to_the_wire_handler() {
        let state = state();
        state.dispatch("/sbackends/add/b", br#"{"type":"mem","arg":null}"#);

        assert_eq!(
            state.dispatch("/backends/b/streams/s/push", br#"{"x":1}"#),
            b"{}".to_vec()
        );
        let len: freshet_storage::wire::LenRes =
            serde_json::from_slice(&state.dispatch("/backends/b/streams/s/len", &[])).unwrap();
        assert_eq!(len.len, 1);
    }

    #[test]
    fn bad_descriptor_is_reported() {
        let state = state();
        let res: ErrorRes = serde_json::from_slice(
            &state.dispatch("/sbackends/add/b", br#"{"type":"tape"}"#),
        )
        .unwrap();
        assert!(res.error.is_some());
    }
}
