//! Line-oriented TCP chat server.
//!
//! Each accepted socket sends its nickname as the first line; every following
//! line is relayed to all other participants as `"<nickname>: <line>"`.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;

pub mod config;
pub mod registry;

pub use config::ServerConfig;
pub use registry::Registry;
pub use ui::Server;
