//! Scores of everyone in the room, in ranking order

use parking_lot::RwLock;
use shared::{Player, PlayerId, ScoreRecord};
use std::sync::Arc;

pub type SharedScoreboard = Arc<RwLock<Scoreboard>>;

/// Score records sorted by score, highest first; ties go to the lower id.
/// One entry may be selected as the opponent on screen.
#[derive(Debug, Default)]
pub struct Scoreboard {
    entries: Vec<ScoreRecord>,
    selected: Option<PlayerId>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedScoreboard {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Inserts or replaces the player's record and restores ranking order
    pub fn update_and_sort(&mut self, record: ScoreRecord) {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.player().id == record.player().id)
        {
            Some(entry) => *entry = record,
            None => self.entries.push(record),
        }
        self.entries.sort_by(|a, b| {
            b.score()
                .cmp(&a.score())
                .then_with(|| a.player().id.cmp(&b.player().id))
        });
    }

    /// Adds a zero score for a player that has no entry yet
    pub fn ensure(&mut self, player: &Player) {
        if self.get(player.id).is_none() {
            self.update_and_sort(ScoreRecord::new(player.clone()));
        }
    }

    pub fn remove(&mut self, player_id: PlayerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.player().id != player_id);
        if self.selected == Some(player_id) {
            self.selected = None;
        }
        self.entries.len() != before
    }

    /// Selects the entry at `index` in ranking order and returns its player
    pub fn select_by_index(&mut self, index: usize) -> Option<Player> {
        let player = self.entries.get(index)?.player().clone();
        self.selected = Some(player.id);
        Some(player)
    }

    pub fn select(&mut self, player_id: PlayerId) -> bool {
        if self.get(player_id).is_some() {
            self.selected = Some(player_id);
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<&ScoreRecord> {
        let id = self.selected?;
        self.get(id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&ScoreRecord> {
        self.entries.iter().find(|e| e.player().id == player_id)
    }

    pub fn position(&self, player_id: PlayerId) -> Option<usize> {
        self.entries.iter().position(|e| e.player().id == player_id)
    }

    pub fn entries(&self) -> &[ScoreRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
