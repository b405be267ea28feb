//! Interactive chat client.
//!
//! Sends the nickname on connect, then sends typed lines and prints lines
//! relayed by the server as they arrive.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin linechat-client -- --nickname alice --host 127.0.0.1 --port 8080
//! cargo run --bin linechat-client -- -n bob
//! ```

use clap::Parser;

use linechat_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "linechat-client")]
#[command(about = "Interactive client for the linechat TCP chat server", long_about = None)]
struct Args {
    /// Nickname sent to the server when connecting
    #[arg(short = 'n', long)]
    nickname: String,

    /// Server host; together with --port, connects on startup
    #[arg(short = 'H', long, requires = "port")]
    host: Option<String>,

    /// Server port
    #[arg(short = 'p', long, requires = "host")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let server = args.host.zip(args.port);

    if let Err(e) = linechat_client::run_client(args.nickname, server).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
