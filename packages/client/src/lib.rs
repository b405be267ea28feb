//! Interactive client for the linechat TCP chat server.

mod agent;
mod command;
mod error;
mod session;
mod ui;

pub use agent::ClientAgent;
pub use command::{Command, CommandError};
pub use error::ClientError;
pub use session::{Flow, Session, run_client};
