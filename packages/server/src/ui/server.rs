//! Acceptor loop.

use std::{future::Future, io, net::SocketAddr, sync::Arc};

use tokio::net::{TcpListener, TcpStream};

use crate::{config::ServerConfig, domain::ServerError, registry::Registry};

use super::{handler::handle_connection, signal::shutdown_signal};

/// TCP chat server
///
/// # Example
///
/// ```ignore
/// let server = Server::bind(&ServerConfig::new("127.0.0.1", 8080)).await?;
/// server.run().await?;
/// ```
pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
}

impl Server {
    /// Bind the listening socket. Failure here is fatal for the process.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self::from_listener(listener))
    }

    pub fn from_listener(listener: TcpListener) -> Self {
        Self {
            listener,
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the live membership table
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Accept connections until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// Each accepted socket gets its own handler task; the loop never waits for
    /// handlers. Only a non-transient accept error stops it early.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Server { listener, registry } = self;
        tokio::pin!(shutdown);

        tracing::info!("Chat server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(
                        "Shutting down with connection(s) still open: {:?}",
                        registry.nicknames().await
                    );
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => spawn_handler(stream, peer, &registry),
                    Err(e) if is_transient(&e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                    }
                    Err(e) => {
                        tracing::error!("Accept loop stopped: {}", e);
                        return Err(ServerError::Accept(e));
                    }
                },
            }
        }

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

fn spawn_handler(stream: TcpStream, peer: SocketAddr, registry: &Arc<Registry>) {
    tracing::debug!("Accepted connection from {}", peer);
    let registry = Arc::clone(registry);
    tokio::spawn(handle_connection(stream, peer, registry));
}

/// Errors caused by a single peer rather than the listener itself
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
