//! Session relay server for the virtual stand-up space.
//!
//! Brokers presence, position, chat, task, and WebRTC-signaling events
//! between connected game clients.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin standup-server
//! cargo run --bin standup-server -- --host 0.0.0.0 --port 3001
//! ```

use clap::Parser;
use standup_server::runner::run_server;
use standup_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "standup-server")]
#[command(about = "Session relay for the virtual stand-up space", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "3001")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_PKG_NAME"), "debug");

    let args = Args::parse();

    if let Err(e) = run_server(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
