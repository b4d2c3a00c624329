//! Identity of the running session, passed explicitly to everything that
//! publishes on the player's behalf

use shared::{game_channel, GameRoom, Player, RoomId};

#[derive(Debug, Clone)]
pub struct SessionContext {
    player: Player,
    room: GameRoom,
}

impl SessionContext {
    pub fn new(player: Player, room: GameRoom) -> Self {
        Self { player, room }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn room(&self) -> &GameRoom {
        &self.room
    }

    pub fn room_id(&self) -> RoomId {
        self.room.id
    }

    /// Channel the room's game traffic is published on
    pub fn channel(&self) -> String {
        game_channel(self.room.id)
    }

    /// Replaces the roster after the relay announced a change
    pub fn set_room(&mut self, room: GameRoom) {
        self.room = room;
    }

    /// Everyone in the room except the local player
    pub fn opponents(&self) -> impl Iterator<Item = &Player> {
        self.room.players.iter().filter(move |p| p.id != self.player.id)
    }
}
