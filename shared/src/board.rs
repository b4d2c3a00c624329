//! The authoritative board model: collision, locking, row clearing and spawning

use crate::block::{Block, BlockShape, Direction, Position, Rotation};
use crate::grid::Grid;
use crate::protocol::PlayerId;
use crate::snapshot::BoardSnapshot;
use crate::{BOARD_COLS, BOARD_ROWS};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Where new pieces come from
#[derive(Debug, Clone)]
pub enum PieceSource {
    /// Always the same shape. Deterministic, used for the single-square game
    /// and in tests.
    Fixed(BlockShape),
    /// Shuffled bags of the seven tetrominoes
    SevenBag { rng: StdRng, bag: Vec<BlockShape> },
}

impl PieceSource {
    pub fn fixed(shape: BlockShape) -> Self {
        PieceSource::Fixed(shape)
    }

    pub fn seven_bag(seed: u64) -> Self {
        PieceSource::SevenBag {
            rng: StdRng::seed_from_u64(seed),
            bag: Vec::new(),
        }
    }

    fn refill(&mut self) {
        if let PieceSource::SevenBag { rng, bag } = self {
            if bag.is_empty() {
                bag.extend_from_slice(&BlockShape::TETROMINOES);
                bag.shuffle(rng);
            }
        }
    }

    /// The shape the next call to `next_shape` will return
    pub fn peek(&mut self) -> BlockShape {
        self.refill();
        match self {
            PieceSource::Fixed(shape) => *shape,
            PieceSource::SevenBag { bag, .. } => bag.last().copied().unwrap_or(BlockShape::I),
        }
    }

    pub fn next_shape(&mut self) -> BlockShape {
        self.refill();
        match self {
            PieceSource::Fixed(shape) => *shape,
            PieceSource::SevenBag { bag, .. } => bag.pop().unwrap_or(BlockShape::I),
        }
    }
}

/// What happened when the falling block locked
#[derive(Debug, Clone)]
pub struct LockReport {
    /// Rows removed by this lock
    pub rows_cleared: u32,
    /// The board right after the block's squares were written, before full
    /// rows were removed. Observers animate the clear from this.
    pub settled: BoardSnapshot,
}

/// One player's board: settled grid plus the falling block.
///
/// Illegal moves are reported as `false` and leave the board untouched. Once
/// a spawned block collides the board is terminal and every mutating call is
/// a no-op.
#[derive(Debug)]
pub struct Board {
    player_id: PlayerId,
    grid: Grid,
    falling: Option<Block>,
    source: PieceSource,
    revision: u32,
    rows_cleared_total: u32,
    rows_cleared_last: u32,
    last_lock: Option<LockReport>,
    game_over: bool,
    game_over_reported: bool,
    penalty_rng: StdRng,
}

impl Board {
    pub fn new(player_id: PlayerId, source: PieceSource) -> Self {
        Self::with_size(player_id, BOARD_ROWS, BOARD_COLS, source)
    }

    pub fn with_size(player_id: PlayerId, rows: usize, cols: usize, source: PieceSource) -> Self {
        Self {
            player_id,
            grid: Grid::new(rows, cols),
            falling: None,
            source,
            revision: 0,
            rows_cleared_total: 0,
            rows_cleared_last: 0,
            last_lock: None,
            game_over: false,
            game_over_reported: false,
            penalty_rng: StdRng::seed_from_u64(player_id as u64),
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn falling(&self) -> Option<&Block> {
        self.falling.as_ref()
    }

    pub fn rows_cleared_total(&self) -> u32 {
        self.rows_cleared_total
    }

    /// Incremented on every mutation; stamped into snapshots as their sequence
    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Shape of the block that will spawn next
    pub fn next_shape(&mut self) -> BlockShape {
        self.source.peek()
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// True when every square of `block` with its pivot at `position` is on
    /// the board and over an empty cell.
    pub fn can_place(&self, block: &Block, position: Position) -> bool {
        block
            .squares_at(position)
            .all(|square| self.grid.in_bounds(square) && !self.grid.is_occupied(square))
    }

    /// Puts a new block at the top of the board. Returns false, and makes the
    /// board terminal, when it does not fit.
    pub fn spawn_block(&mut self) -> bool {
        if self.game_over {
            return false;
        }

        let mut block = Block::new(self.source.next_shape(), self.grid.cols());
        while block.top_row() < 0 {
            block.lower_position();
        }

        if self.can_place(&block, block.position()) {
            self.falling = Some(block);
            self.bump();
            true
        } else {
            self.falling = None;
            self.game_over = true;
            self.bump();
            false
        }
    }

    /// Moves the falling block one square. A blocked downward move locks the
    /// block instead and returns false.
    pub fn try_move(&mut self, direction: Direction) -> bool {
        if self.game_over {
            return false;
        }
        let Some(block) = &self.falling else {
            return false;
        };

        let target = block.shifted(direction);
        if self.can_place(block, target) {
            if let Some(block) = self.falling.as_mut() {
                block.set_position(target);
            }
            self.rows_cleared_last = 0;
            self.bump();
            return true;
        }

        if direction == Direction::Down {
            self.lock();
        }
        false
    }

    /// Turns the falling block a quarter. Rejected, without any wall kick,
    /// when the turned shape would collide.
    pub fn rotate(&mut self, rotation: Rotation) -> bool {
        if self.game_over {
            return false;
        }
        let Some(block) = &self.falling else {
            return false;
        };
        if !block.shape().rotates() {
            return false;
        }

        let rotated = block.rotated(rotation);
        if self.can_place(&rotated, rotated.position()) {
            self.falling = Some(rotated);
            self.rows_cleared_last = 0;
            self.bump();
            true
        } else {
            false
        }
    }

    /// Drops the falling block straight down until it locks. Returns false if
    /// there was nothing to drop.
    pub fn hard_drop(&mut self) -> bool {
        if self.game_over || self.falling.is_none() {
            return false;
        }
        while self.try_move(Direction::Down) {}
        true
    }

    pub fn num_full_rows(&self) -> usize {
        self.grid.num_full_rows()
    }

    fn lock(&mut self) {
        let Some(block) = self.falling.take() else {
            return;
        };

        let code = block.code();
        for square in block.squares() {
            self.grid.set(square, code);
        }
        self.bump();

        let pending = self.grid.num_full_rows() as u32;
        let settled = BoardSnapshot::new(
            self.player_id,
            self.revision,
            self.grid.clone(),
            None,
            pending,
        );

        let rows_cleared = self.grid.clear_full_rows() as u32;
        self.rows_cleared_total = self.rows_cleared_total.saturating_add(rows_cleared);
        self.rows_cleared_last = rows_cleared;
        self.last_lock = Some(LockReport {
            rows_cleared,
            settled,
        });

        self.spawn_block();
    }

    /// Takes the report of the most recent lock, if one happened since the
    /// last call.
    pub fn take_lock(&mut self) -> Option<LockReport> {
        self.last_lock.take()
    }

    /// Returns true exactly once after the board has become terminal
    pub fn take_game_over(&mut self) -> bool {
        if self.game_over && !self.game_over_reported {
            self.game_over_reported = true;
            true
        } else {
            false
        }
    }

    /// Pushes `count` penalty rows onto the bottom of the board. The falling
    /// block is nudged upwards if the rows now overlap it; if it cannot be
    /// saved, or settled squares are pushed off the top, the game is over.
    pub fn add_rows(&mut self, count: u32) -> bool {
        if self.game_over || count == 0 {
            return false;
        }

        let hole = self.penalty_rng.gen_range(0..self.grid.cols());
        let lost = self.grid.push_penalty_rows(count as usize, hole);
        self.rows_cleared_last = 0;
        self.bump();

        if lost > 0 {
            self.falling = None;
            self.game_over = true;
            return true;
        }

        if let Some(mut block) = self.falling.take() {
            while !self.can_place(&block, block.position()) && block.top_row() > 0 {
                block.raise_position();
            }
            if self.can_place(&block, block.position()) {
                self.falling = Some(block);
            } else {
                self.game_over = true;
            }
        }
        true
    }

    /// Captures the grid, falling block and identity without side effects
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot::new(
            self.player_id,
            self.revision,
            self.grid.clone(),
            self.falling.clone(),
            self.rows_cleared_last,
        )
    }
}
