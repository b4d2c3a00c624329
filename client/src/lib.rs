//! # Block Drop client library
//!
//! Runs one player's game and shows the opponents' boards next to it.
//!
//! ## Architecture Overview
//!
//! ### Local game
//! [`game_loop::LocalGameLoop`] owns the player's board. Gravity ticks and
//! keyboard commands mutate it; every accepted change is drawn on the local
//! canvas and published to the room channel through a [`publisher::Publisher`].
//!
//! ### Opponent replay
//! Each remote player gets a [`replay::RemoteReplayController`]. It never
//! runs a board of its own. It queues the snapshots the opponent publishes
//! and plays them back at its own pace, holding a frame for one tick per
//! full row so a clear looks the same on every screen no matter how the
//! packets arrived.
//!
//! ### Routing
//! [`router::MessageRouter`] receives everything delivered on the room
//! channel, drops the local player's own echoes, feeds the replay
//! controllers and the [`scoreboard::Scoreboard`], and hands penalty rows
//! back to the local game.
//!
//! ## Threads
//! The macroquad UI owns the main thread and only paints shared canvases.
//! A background thread runs a tokio runtime with the [`network::Client`],
//! which owns the game, the router and the UDP socket. Keyboard commands
//! cross over on an unbounded channel.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game_loop::InputCommand;
//! use client::network::{Client, ClientConfig, ClientViews};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let views = ClientViews::new();
//!     let mut client = Client::new(ClientConfig::default(), views.clone()).await?;
//!
//!     let (input_tx, input_rx) = mpsc::unbounded_channel();
//!     input_tx.send(InputCommand::HardDrop)?;
//!     client.run(input_rx).await?;
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod game_loop;
pub mod input;
pub mod network;
pub mod publisher;
pub mod rendering;
pub mod replay;
pub mod router;
pub mod scoreboard;
pub mod session;
