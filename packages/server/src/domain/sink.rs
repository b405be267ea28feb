//! Outbound send path abstraction.

use async_trait::async_trait;

use super::ChatError;

/// Write side of a connection.
///
/// `send_line` must not wait on the peer; lines from several broadcasting
/// tasks reach the transport whole and in call order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LineSink: Send + Sync {
    /// Write `text` followed by exactly one line terminator
    async fn send_line(&self, text: &str) -> Result<(), ChatError>;

    /// Release the underlying transport. Calling it more than once is a no-op.
    async fn close(&self);
}
