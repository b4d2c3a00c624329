//! Immutable board captures sent over the wire and replayed by observers

use crate::block::{Block, Position};
use crate::grid::Grid;
use crate::protocol::PlayerId;
use serde::{Deserialize, Serialize};

/// One drawable square: a board coordinate and the code to paint it with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    pub position: Position,
    pub code: u8,
}

/// A point-in-time capture of a board's settled grid and falling block.
///
/// Snapshots are never modified after construction. Replay steps that need a
/// different grid (clearing a row during an animation) build a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    player_id: PlayerId,
    sequence: u32,
    grid: Grid,
    falling: Option<Block>,
    rows_cleared: u32,
}

impl BoardSnapshot {
    pub fn new(
        player_id: PlayerId,
        sequence: u32,
        grid: Grid,
        falling: Option<Block>,
        rows_cleared: u32,
    ) -> Self {
        Self {
            player_id,
            sequence,
            grid,
            falling,
            rows_cleared,
        }
    }

    /// An empty board with no falling block, used before any state arrives
    pub fn empty(player_id: PlayerId, rows: usize, cols: usize) -> Self {
        Self::new(player_id, 0, Grid::new(rows, cols), None, 0)
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn falling(&self) -> Option<&Block> {
        self.falling.as_ref()
    }

    /// Rows cleared by the action that produced this snapshot
    pub fn rows_cleared(&self) -> u32 {
        self.rows_cleared
    }

    pub fn num_full_rows(&self) -> usize {
        self.grid.num_full_rows()
    }

    /// The next frame of a clear animation: this snapshot with its lowest full
    /// row removed.
    pub fn with_lowest_full_row_cleared(&self) -> BoardSnapshot {
        let mut grid = self.grid.clone();
        grid.clear_lowest_full_row();
        Self {
            grid,
            ..self.clone()
        }
    }

    /// Settled squares followed by the falling block's squares that are on the board
    pub fn squares(&self) -> Vec<Square> {
        let mut squares: Vec<Square> = self
            .grid
            .occupied()
            .map(|(position, code)| Square { position, code })
            .collect();
        if let Some(block) = &self.falling {
            let code = block.code();
            squares.extend(
                block
                    .squares()
                    .filter(|position| self.grid.in_bounds(*position))
                    .map(|position| Square { position, code }),
            );
        }
        squares
    }
}
