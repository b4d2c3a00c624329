//! Game room membership

use log::info;
use shared::{GameRoom, Player, PlayerId, RoomId};
use std::collections::HashMap;

/// Rooms are created by their first join and dropped when the last member leaves.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, GameRoom>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `player` to `room_id` and returns the updated roster. Joining a
    /// room twice keeps a single entry.
    pub fn join(&mut self, room_id: RoomId, player: Player) -> GameRoom {
        let room = self
            .rooms
            .entry(room_id)
            .or_insert_with(|| GameRoom::new(room_id));

        if !room.contains(player.id) {
            info!("Player {} joined room {}", player, room_id);
            room.players.push(player);
        }
        room.clone()
    }

    /// Removes a player from a room. Returns the remaining roster, or None if
    /// the player was not a member. An emptied room is dropped and returned
    /// with no players.
    pub fn leave(&mut self, room_id: RoomId, player_id: PlayerId) -> Option<GameRoom> {
        let room = self.rooms.get_mut(&room_id)?;
        let before = room.players.len();
        room.players.retain(|p| p.id != player_id);
        if room.players.len() == before {
            return None;
        }

        info!("Player {} left room {}", player_id, room_id);
        let remaining = room.clone();
        if remaining.players.is_empty() {
            self.rooms.remove(&room_id);
        }
        Some(remaining)
    }

    pub fn get(&self, room_id: RoomId) -> Option<&GameRoom> {
        self.rooms.get(&room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
