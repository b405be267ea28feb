//! Per-connection handler task.
//!
//! `Handshaking → Active → Terminating → Removed`. Every exit from the active
//! loop, including a panic inside it, ends in the same cleanup: remove from
//! the registry, then close the connection.
//!
//! Each connection also gets a writer task that owns the write half of the
//! socket. A write failure there removes the connection and ends the active
//! loop.

use std::{net::SocketAddr, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures_util::FutureExt;
use linechat_shared::protocol::ChatMessage;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};

use crate::{
    domain::{ChatError, Connection, ConnectionId},
    infrastructure::{ChannelSink, LineReader, run_writer},
    registry::Registry,
};

/// How long cleanup waits for queued lines to reach a departing peer
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve one accepted TCP socket until it disconnects.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, registry: Arc<Registry>) {
    let (read_half, write_half) = stream.into_split();
    run_session(LineReader::new(read_half), write_half, Some(peer), registry).await;
}

/// Drive one connection through handshake, relay loop and cleanup.
///
/// Failures never leave this function; other connections are unaffected.
pub async fn run_session<R, W>(
    mut reader: LineReader<R>,
    mut writer: W,
    peer: Option<SocketAddr>,
    registry: Arc<Registry>,
) where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    // Handshaking
    let nickname = match reader.handshake().await {
        Ok(nickname) => nickname,
        Err(e) => {
            tracing::info!("Handshake with {:?} failed: {}", peer, e);
            if let Err(e) = writer.shutdown().await {
                tracing::debug!("Failed to shut down writer: {}", e);
            }
            return;
        }
    };

    let id = ConnectionId::generate();
    let (sink, queue) = ChannelSink::channel();
    let connection = Arc::new(Connection::new(id, nickname, peer, Arc::new(sink)));
    let mut writer_task = spawn_writer(writer, queue, id, registry.clone());

    if let Err(e) = registry.add(connection.clone()).await {
        tracing::warn!("Failed to register '{}': {}", connection.nickname(), e);
        connection.close().await;
        return;
    }
    tracing::info!(
        "Client '{}' ({}) connected from {:?}",
        connection.nickname(),
        id,
        connection.peer()
    );

    // Active
    let outcome = AssertUnwindSafe(relay_lines(
        &mut reader,
        &connection,
        &registry,
        &mut writer_task,
    ))
    .catch_unwind()
    .await;

    // Terminating
    match outcome {
        Ok(ChatError::EndOfStream) => {
            tracing::info!(
                "Client '{}' ({:?}) closed the connection",
                connection.nickname(),
                connection.peer()
            );
        }
        Ok(e) => {
            tracing::warn!(
                "Client '{}' ({:?}) disconnected: {}",
                connection.nickname(),
                connection.peer(),
                e
            );
        }
        Err(_) => {
            tracing::error!("Handler for '{}' panicked", connection.nickname());
        }
    }

    // Removed
    registry.remove(id).await;
    connection.close().await;

    if !writer_task.is_finished()
        && timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task).await.is_err()
    {
        tracing::debug!(
            "Writer for '{}' did not drain in time, aborting",
            connection.nickname()
        );
        writer_task.abort();
    }
}

/// Spawn the task that owns the write half and drains the outbound queue.
///
/// A write failure removes the connection from the registry.
fn spawn_writer<W>(
    writer: W,
    queue: mpsc::UnboundedReceiver<String>,
    id: ConnectionId,
    registry: Arc<Registry>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = run_writer(writer, queue).await {
            tracing::warn!("Failed to write to connection {}: {}", id, e);
            registry.remove(id).await;
        }
    })
}

/// Announce the connection, then relay its lines until reading fails or the
/// writer task stops.
///
/// Each broadcast completes before the next line is read, which keeps lines
/// from one sender in order for every recipient. Broadcasts only enqueue, so a
/// stalled recipient does not hold this loop up.
async fn relay_lines<R>(
    reader: &mut LineReader<R>,
    connection: &Connection,
    registry: &Registry,
    writer_task: &mut JoinHandle<()>,
) -> ChatError
where
    R: AsyncRead + Unpin + Send,
{
    let id = connection.id();
    let nickname = connection.nickname();

    registry
        .broadcast(&ChatMessage::joined(nickname).to_string(), Some(id))
        .await;

    loop {
        tokio::select! {
            line = reader.read_line() => match line {
                Ok(line) => {
                    tracing::debug!("Received from '{}': {}", nickname, line);
                    registry
                        .broadcast(&ChatMessage::chat(nickname, line).to_string(), Some(id))
                        .await;
                }
                Err(e) => return e,
            },
            _ = &mut *writer_task => return ChatError::closed(),
        }
    }
}
