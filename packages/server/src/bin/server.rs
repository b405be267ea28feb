//! Line-oriented TCP chat server.
//!
//! Each client sends its nickname as the first line; every following line is
//! relayed to all other connected clients.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin linechat-server
//! cargo run --bin linechat-server -- --host 0.0.0.0 --port 3000
//! ```

use clap::Parser;

use linechat_server::{Server, ServerConfig};
use linechat_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "linechat-server")]
#[command(about = "Line-oriented TCP chat server with broadcast relay", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to (0 picks a free port)
    #[arg(short = 'p', long, default_value = "0")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    let config = ServerConfig::new(args.host, args.port);

    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
