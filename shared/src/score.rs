//! Per-player score bookkeeping

use crate::protocol::Player;
use serde::{Deserialize, Serialize};

/// Points awarded for clearing 0, 1, 2, 3 or 4 rows in one action
pub const ROW_POINTS: [u64; 5] = [0, 40, 100, 300, 1200];

/// Points for a single action that cleared `rows` rows. Anything above four
/// rows scores as repeated four-row clears plus the remainder.
pub fn points_for_rows(rows: u32) -> u64 {
    let rows = rows as usize;
    let max = ROW_POINTS.len() - 1;
    (rows / max) as u64 * ROW_POINTS[max] + ROW_POINTS[rows % max]
}

/// Cumulative score of one player. The score never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    player: Player,
    score: u64,
    rows_cleared_last: u32,
    total_rows_cleared: u32,
}

impl ScoreRecord {
    pub fn new(player: Player) -> Self {
        Self {
            player,
            score: 0,
            rows_cleared_last: 0,
            total_rows_cleared: 0,
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn rows_cleared_last(&self) -> u32 {
        self.rows_cleared_last
    }

    pub fn total_rows_cleared(&self) -> u32 {
        self.total_rows_cleared
    }

    /// Applies the result of one lock. Returns the points gained.
    pub fn record(&mut self, rows_cleared: u32) -> u64 {
        let points = points_for_rows(rows_cleared);
        self.score = self.score.saturating_add(points);
        self.rows_cleared_last = rows_cleared;
        self.total_rows_cleared = self.total_rows_cleared.saturating_add(rows_cleared);
        points
    }
}
