//! Shared building blocks for the linechat server and client.
//!
//! - `logger`: tracing subscriber setup used by both binaries
//! - `protocol`: the newline-delimited text protocol (notices, terminators)
//! - `time`: timestamp helpers

pub mod logger;
pub mod protocol;
pub mod time;
