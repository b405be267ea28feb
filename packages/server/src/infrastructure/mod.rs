//! Transport implementations.
//!
//! - `line_io`: line reader, outbound queue and writer loop over any tokio byte stream (TCP halves in production)

pub mod line_io;

pub use line_io::{ChannelSink, LineReader, run_writer};
