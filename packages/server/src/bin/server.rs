//! Lobby development relay server.
//!
//! Registers players over HTTP and relays named WebSocket events to every
//! connected client.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lobby-server
//! cargo run --bin lobby-server -- --host 0.0.0.0 --port 5000
//! ```

use clap::Parser;

use lobby_server::Server;
use lobby_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "lobby-server")]
#[command(about = "Lobby relay server for player registration and live events", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "5000")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    if let Err(e) = Server::new().run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
