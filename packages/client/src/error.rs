//! Error types for the chat client.

use std::{io, net::SocketAddr};

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the server
    #[error("Connection error: failed to connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Operation requires an open connection
    #[error("Not connected to a server")]
    NotConnected,

    /// `connect` issued while a connection is open
    #[error("Already connected to {0}")]
    AlreadyConnected(SocketAddr),

    /// Writing to the server failed; the connection is gone
    #[error("Connection lost: {0}")]
    ConnectionLost(#[source] io::Error),
}
