//! # Block Drop relay server
//!
//! The relay is the only networked component the players share. It holds no
//! game state: each player's client runs its own board and publishes what
//! happens on its room's channel. The relay only decides who hears what.
//!
//! ## Responsibilities
//!
//! ### Client Management
//! - Connection handshake with protocol version check and player id assignment
//! - Capacity limits
//! - Timeout detection for clients that stopped sending keep-alives
//!
//! ### Rooms
//! Players join numbered rooms. Every join or departure sends the new roster
//! to all members so each client can rebuild its opponent list.
//!
//! ### Channel Fan-out
//! A publish on channel `Game{room}` is delivered to every client subscribed
//! to it, the publisher included. Publishes from clients that never
//! subscribed are dropped. When a client disconnects or times out, the relay
//! publishes LEAVE_GAME on its behalf.
//!
//! ## Module Organization
//!
//! - [`client_manager`]: connected players, subscriptions and timeouts
//! - [`rooms`]: room rosters
//! - [`network`]: UDP tasks and the relay loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new("127.0.0.1:8080", 16, Duration::from_secs(5)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! Internally the relay runs three tasks next to its main loop:
//! - **Network Receiver**: decodes incoming datagrams
//! - **Network Sender**: sends direct replies and channel deliveries
//! - **Timeout Checker**: removes silent clients once per second

pub mod client_manager;
pub mod network;
pub mod rooms;
