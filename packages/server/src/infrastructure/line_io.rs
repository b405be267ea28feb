//! Line-oriented reader and writer over tokio byte streams.
//!
//! ## Framing
//!
//! A line ends at `\n`. Reads are bounded to [`MAX_LINE_BYTES`] per call, so a
//! longer logical line comes back as several fragments. Trailing `\r`/`\n`
//! are stripped on read and exactly one `\n` is appended on write.
//!
//! ## Outbound path
//!
//! Writes go through a per-connection queue drained by a dedicated writer
//! task, the same split as one `UnboundedSender` per client plus a send task.

use std::io;

use async_trait::async_trait;
use linechat_shared::protocol::{MAX_LINE_BYTES, frame_line, strip_terminators};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{Mutex, mpsc},
};

use crate::domain::{ChatError, LineSink};

/// Read side of a connection, owned by its handler task
pub struct LineReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::with_capacity(MAX_LINE_BYTES, inner),
        }
    }

    /// Read one raw fragment: up to and including `\n`, at most `MAX_LINE_BYTES`.
    ///
    /// `Ok(None)` means the peer closed the stream.
    async fn read_fragment(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::with_capacity(128);
        let n = (&mut self.reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Read the nickname line sent right after connecting.
    ///
    /// The nickname is not validated beyond stripping its terminator.
    pub async fn handshake(&mut self) -> Result<String, ChatError> {
        match self.read_fragment().await {
            Ok(Some(line)) => Ok(strip_terminators(&line).to_string()),
            Ok(None) => Err(ChatError::ProtocolError),
            Err(e) => {
                tracing::debug!("Transport failure during handshake: {}", e);
                Err(ChatError::ProtocolError)
            }
        }
    }

    /// Read the next non-empty line of user input, without its terminator.
    pub async fn read_line(&mut self) -> Result<String, ChatError> {
        loop {
            let Some(fragment) = self.read_fragment().await? else {
                return Err(ChatError::EndOfStream);
            };
            let line = strip_terminators(&fragment);
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        }
    }
}

/// Outbound queue of a connection.
///
/// `send_line` only enqueues, so a peer that stops reading never blocks the
/// task that broadcasts to it. The socket is written by [`run_writer`], which
/// owns the write half and drains the queue in order.
pub struct ChannelSink {
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl ChannelSink {
    /// Create the sink and the receiver to hand to [`run_writer`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

#[async_trait]
impl LineSink for ChannelSink {
    async fn send_line(&self, text: &str) -> Result<(), ChatError> {
        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or_else(ChatError::closed)?;
        // Fails once the writer has stopped and dropped the receiver
        sender
            .send(text.to_string())
            .map_err(|_| ChatError::closed())
    }

    async fn close(&self) {
        // Dropping the sender lets the writer flush what is queued and shut down
        self.sender.lock().await.take();
    }
}

/// Write queued lines to `writer` until the queue is closed.
///
/// Each line gets exactly one terminator. Returns the first write failure;
/// on a clean end the write side is shut down.
pub async fn run_writer<W>(
    mut writer: W,
    mut queue: mpsc::UnboundedReceiver<String>,
) -> Result<(), ChatError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(text) = queue.recv().await {
        writer.write_all(frame_line(&text).as_bytes()).await?;
        writer.flush().await?;
    }
    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Failed to shut down writer: {}", e);
    }
    Ok(())
}
