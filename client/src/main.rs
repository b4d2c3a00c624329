use clap::Parser;
use client::game_loop::InputCommand;
use client::input::InputManager;
use client::network::{Client, ClientConfig, ClientViews};
use client::rendering::Renderer;
use log::{error, info};
use macroquad::prelude::*;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name shown to other players
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Room to join
    #[arg(short = 'r', long, default_value = "1")]
    room: u32,

    /// Gravity period in milliseconds
    #[arg(long, default_value = "500")]
    gravity_ms: u64,

    /// Opponent replay period in milliseconds
    #[arg(long, default_value = "50")]
    replay_ms: u64,

    /// Keep-alive period in milliseconds
    #[arg(long, default_value = "1000")]
    keep_alive_ms: u64,

    /// Seed for the piece sequence
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server: self.server.clone(),
            name: self.name.clone(),
            room: self.room,
            gravity: Duration::from_millis(self.gravity_ms),
            replay: Duration::from_millis(self.replay_ms),
            keep_alive: Duration::from_millis(self.keep_alive_ms),
            seed: self.seed,
        }
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Block Drop".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

/// Runs the network client on its own tokio runtime until the UI drops its
/// end of the input channel.
fn spawn_network_thread(
    config: ClientConfig,
    views: ClientViews,
    input_rx: mpsc::UnboundedReceiver<InputCommand>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to start runtime: {}", e);
                return;
            }
        };

        runtime.block_on(async move {
            match Client::new(config, views).await {
                Ok(mut client) => {
                    if let Err(e) = client.run(input_rx).await {
                        error!("Client stopped: {}", e);
                    }
                }
                Err(e) => error!("Failed to create client: {}", e),
            }
        });
    })
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to {} as {} (room {})", args.server, args.name, args.room);
    info!("Controls: arrows/WASD to move, Up/X/Z to rotate, Space to drop");
    info!("P to pause, Tab to watch the next opponent, Esc to quit");

    let views = ClientViews::new();
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let network = spawn_network_thread(args.client_config(), views.clone(), input_rx);

    let renderer = Renderer::new(args.width, args.height);
    let mut input = InputManager::new();

    loop {
        if input.quit_requested() || network.is_finished() {
            break;
        }

        for command in input.update() {
            if input_tx.send(command).is_err() {
                break;
            }
        }

        {
            let local = views.local.lock().clone();
            let opponent = views.opponent.lock().clone();
            let status = views.status.lock().clone();
            let scoreboard = views.scoreboard.read();
            renderer.render(&local, &opponent, &scoreboard, &status);
        }

        next_frame().await;
    }

    drop(input_tx);
    if network.join().is_err() {
        error!("Network thread panicked");
    }
}
