//! Domain layer: connections, their outbound send path and error taxonomy.

mod connection;
mod error;
mod sink;

pub use connection::{Connection, ConnectionId};
pub use error::{ChatError, RegistryError, ServerError};
pub use sink::LineSink;

#[cfg(test)]
pub use sink::MockLineSink;
