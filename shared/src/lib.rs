//! # Block Drop shared library
//!
//! Everything both sides of the wire agree on: the falling-block board model
//! and the synchronization protocol.
//!
//! ## Board model
//! - [`block`]: piece shapes, orientations and the lazy square iterator
//! - [`grid`]: fixed-size settled-cell storage with row clearing and penalty rows
//! - [`board`]: the authoritative board a player's game loop owns
//! - [`snapshot`]: immutable captures of a board, sent to observers
//! - [`score`]: per-player score records and the points table
//!
//! ## Protocol
//! [`protocol`] defines the five game message kinds carried on a room's
//! channel, the relay packets wrapping them, and the bincode datagram codec.
//!
//! The board is deterministic for a given piece source, so a snapshot
//! replayed by an observer shows exactly what the owning player saw.

pub mod block;
pub mod board;
pub mod grid;
pub mod protocol;
pub mod score;
pub mod snapshot;

pub use block::{Block, BlockShape, Direction, Position, Rotation, Squares, PENALTY_CODE};
pub use board::{Board, LockReport, PieceSource};
pub use grid::{Grid, GridSizeError, EMPTY};
pub use protocol::{
    decode_packet, encode_packet, game_channel, Command, GameMessage, GameRoom, Packet, Player,
    PlayerId, ProtocolError, RoomId, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
pub use score::{points_for_rows, ScoreRecord};
pub use snapshot::{BoardSnapshot, Square};

pub const BOARD_ROWS: usize = 20;
pub const BOARD_COLS: usize = 10;
