//! Connection entity.

use std::{
    fmt,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use linechat_shared::time::now_millis;
use uuid::Uuid;

use super::{ChatError, LineSink};

/// Identity of one accepted socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh identity (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One handshaken peer.
///
/// The handler task owns the read side of the socket; the `Connection` holds
/// the write side so it can be shared with the registry for broadcasting.
pub struct Connection {
    id: ConnectionId,
    nickname: String,
    peer: Option<SocketAddr>,
    /// Unix timestamp when the handshake completed (milliseconds)
    connected_at: i64,
    sink: Arc<dyn LineSink>,
    alive: AtomicBool,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        nickname: String,
        peer: Option<SocketAddr>,
        sink: Arc<dyn LineSink>,
    ) -> Self {
        Self {
            id,
            nickname,
            peer,
            connected_at: now_millis(),
            sink,
            alive: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Send one line to the peer.
    ///
    /// A failed send is never retried; the caller removes the connection.
    pub async fn send(&self, text: &str) -> Result<(), ChatError> {
        if !self.is_alive() {
            return Err(ChatError::closed());
        }
        self.sink.send_line(text).await
    }

    /// Release the socket. Only the first call reaches the transport.
    pub async fn close(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            self.sink.close().await;
            tracing::debug!("Connection {} ('{}') closed", self.id, self.nickname);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("nickname", &self.nickname)
            .field("peer", &self.peer)
            .field("connected_at", &self.connected_at)
            .field("alive", &self.is_alive())
            .finish()
    }
}
