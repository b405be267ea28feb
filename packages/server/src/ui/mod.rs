//! TCP chat server: acceptor loop and per-connection handler tasks.

mod handler;
mod server;
mod signal;

pub use handler::{handle_connection, run_session};
pub use server::Server;
pub use signal::shutdown_signal;
