use clap::Parser;
use log::info;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of connected players
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Seconds of silence before a player is dropped
    #[arg(short, long, default_value = "5")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    info!(
        "Starting relay on {} (max {} players, {}s timeout)",
        addr, args.max_clients, args.timeout_secs
    );

    let mut server =
        Server::new(&addr, args.max_clients, Duration::from_secs(args.timeout_secs)).await?;
    let control = server.control();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
            let _ = control.send(server::network::ServerMessage::Shutdown);
        }
    });

    server.run().await
}
