//! Live membership table and broadcast relay.
//!
//! ## Locking
//!
//! The membership map is locked only to insert, delete, or copy the target
//! list of a broadcast. Sending happens after the lock is released and only
//! enqueues onto each connection's outbound queue; the socket write happens in
//! that connection's writer task, so one slow peer does not hold up delivery
//! to everyone else.
//!
//! ## Failed sends
//!
//! A target whose send fails is removed during the same broadcast pass. Its
//! leave notice is queued and relayed after the current pass has finished, so
//! a broadcast never re-enters itself and never iterates a map that is being
//! mutated.

use std::{
    collections::{HashMap, VecDeque, hash_map::Entry},
    sync::Arc,
};

use linechat_shared::{
    protocol::ChatMessage,
    time::{elapsed_millis, timestamp_to_rfc3339},
};
use tokio::sync::Mutex;

use crate::domain::{Connection, ConnectionId, RegistryError};

/// One queued relay: text plus the connection that must not receive it
struct Outgoing {
    text: String,
    exclude: Option<ConnectionId>,
}

/// Thread-safe mapping from connection identity to live connection
#[derive(Default)]
pub struct Registry {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handshaken connection.
    pub async fn add(&self, connection: Arc<Connection>) -> Result<(), RegistryError> {
        let mut connections = self.connections.lock().await;
        match connections.entry(connection.id()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(connection.id())),
            Entry::Vacant(entry) => {
                tracing::debug!(
                    "Connection {} ('{}') registered",
                    connection.id(),
                    connection.nickname()
                );
                entry.insert(connection);
                Ok(())
            }
        }
    }

    /// Remove a connection and announce its departure to everyone left.
    ///
    /// Returns `false` if the connection was not registered. Only the call that
    /// actually deletes the entry broadcasts the leave notice, so concurrent or
    /// repeated removals announce it once.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let Some(removed) = self.take(id).await else {
            return false;
        };
        self.relay(Self::leave_notice(&removed)).await;
        true
    }

    /// Send `text` to every registered connection except `exclude`.
    ///
    /// Returns the number of connections the text was delivered to. Targets
    /// whose send fails are removed, and their leave notices are relayed
    /// before this call returns.
    pub async fn broadcast(&self, text: &str, exclude: Option<ConnectionId>) -> usize {
        self.relay(Outgoing {
            text: text.to_string(),
            exclude,
        })
        .await
    }

    /// Number of live connections
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().await.contains_key(&id)
    }

    /// Nicknames of the live connections, sorted for stable output
    pub async fn nicknames(&self) -> Vec<String> {
        let connections = self.connections.lock().await;
        let mut nicknames: Vec<String> = connections
            .values()
            .map(|connection| connection.nickname().to_string())
            .collect();
        nicknames.sort();
        nicknames
    }

    /// Delete the entry, reporting whether it was present, in one critical section.
    async fn take(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let removed = self.connections.lock().await.remove(&id)?;
        tracing::info!(
            "Connection {} ('{}') removed, connected since {} ({} ms)",
            id,
            removed.nickname(),
            timestamp_to_rfc3339(removed.connected_at()),
            elapsed_millis(removed.connected_at())
        );
        Some(removed)
    }

    /// Copy the current targets so no lock is held while sending.
    async fn snapshot(&self, exclude: Option<ConnectionId>) -> Vec<Arc<Connection>> {
        let connections = self.connections.lock().await;
        connections
            .values()
            .filter(|connection| Some(connection.id()) != exclude)
            .cloned()
            .collect()
    }

    fn leave_notice(connection: &Connection) -> Outgoing {
        Outgoing {
            text: ChatMessage::left(connection.nickname()).to_string(),
            exclude: None,
        }
    }

    /// Drain the relay queue starting from `first`.
    ///
    /// Returns the delivery count of `first` only.
    async fn relay(&self, first: Outgoing) -> usize {
        let mut queue = VecDeque::from([first]);
        let mut first_delivered = None;

        while let Some(outgoing) = queue.pop_front() {
            let targets = self.snapshot(outgoing.exclude).await;
            let text = outgoing.text.as_str();

            let mut delivered = 0;
            for connection in &targets {
                match connection.send(text).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        tracing::warn!(
                            "Failed to send to '{}' ({}): {}",
                            connection.nickname(),
                            connection.id(),
                            e
                        );
                        if let Some(removed) = self.take(connection.id()).await {
                            removed.close().await;
                            queue.push_back(Self::leave_notice(&removed));
                        }
                    }
                }
            }

            tracing::debug!("Relayed '{}' to {} connection(s)", text, delivered);
            first_delivered.get_or_insert(delivered);
        }

        first_delivered.unwrap_or(0)
    }
}
