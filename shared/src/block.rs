//! Falling pieces: shapes, orientations, positions and the lazy square iterator

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Source of unique block identities. Starts at 1 so 0 never names a block.
static NEXT_BLOCK_ID: AtomicU32 = AtomicU32::new(1);

fn generate_id() -> u32 {
    NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed)
}

/// A (row, col) coordinate on the board. Row 0 is the top row and rows grow downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self {
            row: self.row.saturating_add(d_row),
            col: self.col.saturating_add(d_col),
        }
    }
}

/// Translation directions accepted by the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Down,
}

impl Direction {
    /// Returns the (row, col) delta of a single step
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
            Direction::Down => (1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Clockwise,
    Counterclockwise,
}

/// Shape variants. The numeric code is what gets stored in settled grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockShape {
    /// A single square, the original Block Drop piece
    Basic,
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

/// Grid code used for rows pushed onto a board as a penalty
pub const PENALTY_CODE: u8 = 9;

impl BlockShape {
    pub const TETROMINOES: [BlockShape; 7] = [
        BlockShape::I,
        BlockShape::O,
        BlockShape::T,
        BlockShape::S,
        BlockShape::Z,
        BlockShape::J,
        BlockShape::L,
    ];

    pub fn code(self) -> u8 {
        match self {
            BlockShape::Basic => 1,
            BlockShape::I => 2,
            BlockShape::O => 3,
            BlockShape::T => 4,
            BlockShape::S => 5,
            BlockShape::Z => 6,
            BlockShape::J => 7,
            BlockShape::L => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(BlockShape::Basic),
            2 => Some(BlockShape::I),
            3 => Some(BlockShape::O),
            4 => Some(BlockShape::T),
            5 => Some(BlockShape::S),
            6 => Some(BlockShape::Z),
            7 => Some(BlockShape::J),
            8 => Some(BlockShape::L),
            _ => None,
        }
    }

    /// Offsets from the pivot in the spawn orientation
    fn base_offsets(self) -> &'static [(i32, i32)] {
        match self {
            BlockShape::Basic => &[(0, 0)],
            BlockShape::I => &[(0, -1), (0, 0), (0, 1), (0, 2)],
            BlockShape::O => &[(0, 0), (0, 1), (1, 0), (1, 1)],
            BlockShape::T => &[(-1, 0), (0, -1), (0, 0), (0, 1)],
            BlockShape::S => &[(0, 0), (0, 1), (1, -1), (1, 0)],
            BlockShape::Z => &[(0, -1), (0, 0), (1, 0), (1, 1)],
            BlockShape::J => &[(-1, -1), (0, -1), (0, 0), (0, 1)],
            BlockShape::L => &[(-1, 1), (0, -1), (0, 0), (0, 1)],
        }
    }

    /// Whether the shape has more than one distinct orientation
    pub fn rotates(self) -> bool {
        !matches!(self, BlockShape::Basic | BlockShape::O)
    }

    pub fn len(self) -> usize {
        self.base_offsets().len()
    }
}

/// Rotates an offset clockwise `turns` quarter turns: (r, c) -> (c, -r)
fn rotate_offset((row, col): (i32, i32), turns: u8) -> (i32, i32) {
    match turns % 4 {
        0 => (row, col),
        1 => (col, -row),
        2 => (-row, -col),
        _ => (-col, row),
    }
}

/// A single falling piece.
///
/// The offsets are fixed by the shape; only the pivot position and the
/// orientation change while the block falls. Two blocks are equal when they
/// share an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    id: u32,
    shape: BlockShape,
    orientation: u8,
    position: Position,
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}

impl Block {
    /// Creates a block horizontally centred on a board with `cols` columns,
    /// with its lowest square on row -1 (just above the board).
    pub fn new(shape: BlockShape, cols: usize) -> Self {
        let lowest = shape
            .base_offsets()
            .iter()
            .map(|(row, _)| *row)
            .max()
            .unwrap_or(0);
        Self::at(shape, Position::new(-1 - lowest, (cols / 2) as i32))
    }

    pub fn at(shape: BlockShape, position: Position) -> Self {
        Self {
            id: generate_id(),
            shape,
            orientation: 0,
            position,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn shape(&self) -> BlockShape {
        self.shape
    }

    pub fn code(&self) -> u8 {
        self.shape.code()
    }

    pub fn orientation(&self) -> u8 {
        self.orientation
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Number of squares in this block
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    /// Offsets of every square from the pivot in the current orientation
    pub fn offsets(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let turns = self.orientation;
        self.shape
            .base_offsets()
            .iter()
            .map(move |offset| rotate_offset(*offset, turns))
    }

    /// Board coordinates of every square at the block's current position
    pub fn squares(&self) -> Squares {
        self.squares_at(self.position)
    }

    /// Board coordinates the block would occupy with its pivot at `position`
    pub fn squares_at(&self, position: Position) -> Squares {
        Squares {
            offsets: self.shape.base_offsets(),
            turns: self.orientation,
            origin: position,
            next: 0,
        }
    }

    /// Topmost row occupied by the block
    pub fn top_row(&self) -> i32 {
        self.squares().map(|p| p.row).min().unwrap_or(self.position.row)
    }

    /// Lowers the block by one square
    pub fn lower_position(&mut self) {
        self.position = self.position.offset(1, 0);
    }

    pub fn raise_position(&mut self) {
        self.position = self.position.offset(-1, 0);
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Pivot position after one step in `direction`
    pub fn shifted(&self, direction: Direction) -> Position {
        let (d_row, d_col) = direction.delta();
        self.position.offset(d_row, d_col)
    }

    /// A copy of this block turned one quarter in `rotation`. Identity is kept.
    pub fn rotated(&self, rotation: Rotation) -> Block {
        let mut rotated = self.clone();
        if self.shape.rotates() {
            rotated.orientation = match rotation {
                Rotation::Clockwise => (self.orientation + 1) % 4,
                Rotation::Counterclockwise => (self.orientation + 3) % 4,
            };
        }
        rotated
    }
}

/// Lazy, finite iterator over the board coordinates of a block's squares.
///
/// It borrows nothing from the block, so the block can be moved while an
/// iterator taken earlier is still in use; the iterator keeps the old position.
#[derive(Debug, Clone)]
pub struct Squares {
    offsets: &'static [(i32, i32)],
    turns: u8,
    origin: Position,
    next: usize,
}

impl Iterator for Squares {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        let offset = *self.offsets.get(self.next)?;
        self.next += 1;
        let (d_row, d_col) = rotate_offset(offset, self.turns);
        Some(self.origin.offset(d_row, d_col))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.offsets.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Squares {}
