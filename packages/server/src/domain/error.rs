//! Error types for the chat server.

use std::io;

use thiserror::Error;

use super::ConnectionId;

/// Per-connection failures.
///
/// All variants are handled inside the handler task that owns the connection
/// and never cross task boundaries.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The peer disconnected before sending its nickname
    #[error("peer disconnected before sending a nickname")]
    ProtocolError,

    /// Reset, broken pipe or a similar failure on an established connection
    #[error("transport error: {0}")]
    TransportError(#[from] io::Error),

    /// The peer closed the connection cleanly
    #[error("peer closed the connection")]
    EndOfStream,
}

impl ChatError {
    /// Error returned when writing to a connection that was already closed.
    pub fn closed() -> Self {
        Self::TransportError(io::Error::new(
            io::ErrorKind::NotConnected,
            "connection already closed",
        ))
    }
}

/// Registry membership errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Connection identity is already present in the registry
    #[error("Connection '{0}' is already registered")]
    AlreadyRegistered(ConnectionId),
}

/// Errors that stop the acceptor loop
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Accepting connections failed in a way the loop cannot recover from
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// Other listener I/O failure
    #[error("listener error: {0}")]
    Io(#[from] io::Error),
}
