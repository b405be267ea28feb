//! Client Agent: one TCP connection to the chat server.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use linechat_shared::protocol::{frame_line, strip_terminators};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
    task::JoinHandle,
};

use crate::error::ClientError;

/// Connected client.
///
/// Incoming lines are delivered through the receiver returned by
/// [`ClientAgent::connect`]; the receiver yields `None` once the connection
/// is gone.
pub struct ClientAgent {
    writer: OwnedWriteHalf,
    server_addr: SocketAddr,
    connected: Arc<AtomicBool>,
    receive_task: JoinHandle<()>,
}

impl ClientAgent {
    /// Connect to `host:port` and identify as `nickname`.
    pub async fn connect(
        host: &str,
        port: u16,
        nickname: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), ClientError> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ClientError::Connection {
                addr: addr.clone(),
                source,
            })?;
        let server_addr = stream
            .peer_addr()
            .map_err(|source| ClientError::Connection { addr, source })?;

        let (read_half, mut writer) = stream.into_split();

        // Handshake: the first line is the nickname
        writer
            .write_all(frame_line(nickname).as_bytes())
            .await
            .map_err(ClientError::ConnectionLost)?;

        let connected = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::unbounded_channel();
        let receive_task = tokio::spawn(receive_lines(read_half, tx, connected.clone()));

        tracing::info!("Connected to {} as '{}'", server_addr, nickname);

        Ok((
            Self {
                writer,
                server_addr,
                connected,
                receive_task,
            },
            rx,
        ))
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Send one line of chat text. The server adds the nickname prefix.
    pub async fn send_line(&mut self, text: &str) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let result = async {
            self.writer.write_all(frame_line(text).as_bytes()).await?;
            self.writer.flush().await
        }
        .await;

        if let Err(e) = result {
            self.connected.store(false, Ordering::Release);
            return Err(ClientError::ConnectionLost(e));
        }
        Ok(())
    }

    /// Close the connection and stop the receive task.
    pub async fn disconnect(mut self) {
        self.connected.store(false, Ordering::Release);
        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!("Failed to shut down connection: {}", e);
        }
        self.receive_task.abort();
        tracing::info!("Disconnected from {}", self.server_addr);
    }
}

/// Forward every line from the server until it closes the connection.
async fn receive_lines(
    read_half: OwnedReadHalf,
    tx: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                tracing::info!("Server closed the connection");
                break;
            }
            Ok(_) => {
                if tx.send(strip_terminators(&line).to_string()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Read error: {}", e);
                break;
            }
        }
    }

    connected.store(false, Ordering::Release);
}
