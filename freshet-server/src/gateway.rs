//! The TCP event gateway.
//!
//! One JSON envelope per line in each direction. Every connection gets
//! a [`Session`]; inbound lines are processed strictly in order on a
//! blocking task (publish order is per-connection), while a writer task
//! drains the session's outbound queue.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use freshet_service::Service;

use crate::error::ServerResult;
use crate::session::Session;

/// Accepts connections on `listener` until `shutdown` fires.
///
/// # Errors
///
/// Accept-loop failures; individual connection failures are logged and
/// contained.
pub async fn run(
    service: Arc<Service>,
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> ServerResult<()> {
    info!(addr = %listener.local_addr()?, "event gateway listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let conn = Uuid::new_v4();
                    debug!(%conn, %peer, "connection open");
                    if let Err(err) = handle_connection(service, stream).await {
                        warn!(%conn, %peer, error = %err, "connection failed");
                    }
                    debug!(%conn, %peer, "connection closed");
                });
            }
            _ = shutdown.recv() => {
                info!("event gateway shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(service: Arc<Service>, stream: TcpStream) -> ServerResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let session = Arc::new(Session::new(service, outbound_tx));

    let writer = tokio::spawn(async move {
        while let Some(mut message) = outbound_rx.recv().await {
            message.push(b'\n');
            if write_half.write_all(&message).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    let result = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let session = Arc::clone(&session);
                let handled =
                    tokio::task::spawn_blocking(move || session.handle_message(line.as_bytes()))
                        .await;
                match handled {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => break Err(err),
                    Err(join_err) => {
                        warn!(error = %join_err, "message handler panicked");
                        break Ok(());
                    }
                }
            }
            Ok(None) => break Ok(()),
            Err(err) => break Err(err.into()),
        }
    };

    // drop our queue reference and unsubscribe everything the peer left
    let session_cleanup = Arc::clone(&session);
    let _ = tokio::task::spawn_blocking(move || session_cleanup.close()).await;
    drop(session);
    writer.abort();
    result
}
