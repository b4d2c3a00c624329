//! Synchronization protocol: game messages, relay packets and the wire codec

use crate::score::ScoreRecord;
use crate::snapshot::BoardSnapshot;
use bincode::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type PlayerId = u32;
pub type RoomId = u32;

/// Only clients speaking this version are accepted by the relay
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest datagram either side will send or accept
pub const MAX_PACKET_SIZE: usize = 4096;

/// A registered player. Identity is the id; the name is display only.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::hash::Hash for Player {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// A game session and its current members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRoom {
    pub id: RoomId,
    pub players: Vec<Player>,
}

impl GameRoom {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            players: Vec::new(),
        }
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }
}

/// Name of the publish/subscribe channel carrying a room's game traffic
pub fn game_channel(room: RoomId) -> String {
    format!("Game{}", room)
}

/// Message kinds of the synchronization protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    MoveUpdate,
    UpdateScore,
    GameKeepAlive,
    SwitchOpponent,
    LeaveGame,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::MoveUpdate => "MOVE_UPDATE",
            Command::UpdateScore => "UPDATE_SCORE",
            Command::GameKeepAlive => "GAME_KEEP_ALIVE",
            Command::SwitchOpponent => "SWITCH_OPPONENT",
            Command::LeaveGame => "LEAVE_GAME",
        };
        f.write_str(name)
    }
}

/// Payload of a game message, one variant per `Command`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameMessage {
    /// New state after a move or lock; sent even when no rows were cleared
    MoveUpdate { player: Player, state: BoardSnapshot },
    /// A player's score changed. `target`, when set, receives the cleared rows
    /// as a penalty.
    UpdateScore {
        score: ScoreRecord,
        target: Option<Player>,
    },
    /// Heartbeat, also sent while the sender is paused
    GameKeepAlive { player: Player },
    /// Show `player`'s board as the active opponent
    SwitchOpponent { player: Player },
    LeaveGame { player: Player, room: RoomId },
}

impl GameMessage {
    pub fn command(&self) -> Command {
        match self {
            GameMessage::MoveUpdate { .. } => Command::MoveUpdate,
            GameMessage::UpdateScore { .. } => Command::UpdateScore,
            GameMessage::GameKeepAlive { .. } => Command::GameKeepAlive,
            GameMessage::SwitchOpponent { .. } => Command::SwitchOpponent,
            GameMessage::LeaveGame { .. } => Command::LeaveGame,
        }
    }

    /// The player the message is about (the sender for everything except
    /// SWITCH_OPPONENT, which names the opponent to display)
    pub fn player(&self) -> &Player {
        match self {
            GameMessage::MoveUpdate { player, .. } => player,
            GameMessage::UpdateScore { score, .. } => score.player(),
            GameMessage::GameKeepAlive { player } => player,
            GameMessage::SwitchOpponent { player } => player,
            GameMessage::LeaveGame { player, .. } => player,
        }
    }
}

/// Datagrams exchanged between clients and the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    // Client -> relay
    Connect { client_version: u32, name: String },
    JoinRoom { room: RoomId },
    Subscribe { channel: String },
    Publish { channel: String, message: GameMessage },
    Disconnect,

    // Relay -> client
    Connected { player: Player },
    RoomJoined { room: GameRoom },
    Deliver { channel: String, message: GameMessage },
    Disconnected { reason: String },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode packet: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode packet: {0}")]
    Decode(#[source] bincode::Error),
    #[error("packet of {0} bytes exceeds the datagram size limit")]
    Oversized(usize),
}

pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let data = serialize(packet).map_err(ProtocolError::Encode)?;
    if data.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::Oversized(data.len()));
    }
    Ok(data)
}

pub fn decode_packet(data: &[u8]) -> Result<Packet, ProtocolError> {
    if data.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::Oversized(data.len()));
    }
    deserialize(data).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, PieceSource};
    use crate::block::BlockShape;

    #[test]
    fn test_player_identity_ignores_name() {
        assert_eq!(Player::new(4, "ada"), Player::new(4, "renamed"));
        assert_ne!(Player::new(4, "ada"), Player::new(5, "ada"));
        assert_eq!(Player::new(4, "ada").to_string(), "ada#4");
    }

    #[test]
    fn test_game_channel_name() {
        assert_eq!(game_channel(12), "Game12");
    }

    #[test]
    fn test_message_commands() {
        let player = Player::new(1, "ada");
        let keep_alive = GameMessage::GameKeepAlive {
            player: player.clone(),
        };
        assert_eq!(keep_alive.command(), Command::GameKeepAlive);
        assert_eq!(keep_alive.player(), &player);

        let score = GameMessage::UpdateScore {
            score: ScoreRecord::new(player.clone()),
            target: None,
        };
        assert_eq!(score.command(), Command::UpdateScore);
        assert_eq!(score.player().id, 1);
        assert_eq!(Command::LeaveGame.to_string(), "LEAVE_GAME");
    }

    #[test]
    fn test_full_board_snapshot_fits_in_one_datagram() {
        let mut board = Board::new(1, PieceSource::fixed(BlockShape::I));
        board.spawn_block();
        let packet = Packet::Deliver {
            channel: game_channel(1),
            message: GameMessage::MoveUpdate {
                player: Player::new(1, "a fairly long player name"),
                state: board.snapshot(),
            },
        };

        let data = encode_packet(&packet).unwrap();
        assert!(data.len() < MAX_PACKET_SIZE);

        match decode_packet(&data).unwrap() {
            Packet::Deliver { channel, message } => {
                assert_eq!(channel, "Game1");
                match message {
                    GameMessage::MoveUpdate { player, state } => {
                        assert_eq!(player.id, 1);
                        assert_eq!(state, board.snapshot());
                    }
                    other => panic!("Unexpected message {:?}", other),
                }
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_snapshot_with_truncated_grid() {
        let mut board = Board::new(1, PieceSource::fixed(BlockShape::T));
        board.spawn_block();
        let packet = Packet::Deliver {
            channel: game_channel(1),
            message: GameMessage::MoveUpdate {
                player: Player::new(1, "ada"),
                state: board.snapshot(),
            },
        };
        let data = encode_packet(&packet).unwrap();

        // Find the grid header (rows, cols, cell count) and drop every cell.
        let header: Vec<u8> = [20u64, 10, 200]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let at = data
            .windows(header.len())
            .position(|w| w == header.as_slice())
            .unwrap();
        let mut tampered = data[..at + 16].to_vec();
        tampered.extend_from_slice(&0u64.to_le_bytes());
        tampered.extend_from_slice(&data[at + header.len() + 200..]);

        assert!(matches!(
            decode_packet(&tampered),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_packet(&[]), Err(ProtocolError::Decode(_))));
        assert!(matches!(
            decode_packet(&[0xFF; 8]),
            Err(ProtocolError::Decode(_))
        ));
        let oversized = vec![0u8; MAX_PACKET_SIZE + 1];
        assert!(matches!(
            decode_packet(&oversized),
            Err(ProtocolError::Oversized(_))
        ));
    }
}
