//! Drawing capability used by the game loop and the replay controllers

use parking_lot::Mutex;
use shared::{Square, EMPTY};
use std::sync::Arc;

/// Somewhere a board can be painted. `x` and `y` offset every square by
/// columns and rows.
pub trait BoardDisplay: Send {
    fn draw_block(&mut self, x: i32, y: i32, squares: &[Square]);
    fn undraw_block(&mut self, x: i32, y: i32, squares: &[Square]);
    fn clear_board(&mut self);
}

pub type SharedDisplay = Arc<Mutex<dyn BoardDisplay>>;

/// Discards everything
#[derive(Debug, Default)]
pub struct NoopDisplay;

impl BoardDisplay for NoopDisplay {
    fn draw_block(&mut self, _x: i32, _y: i32, _squares: &[Square]) {}
    fn undraw_block(&mut self, _x: i32, _y: i32, _squares: &[Square]) {}
    fn clear_board(&mut self) {}
}

/// In-memory picture of a board. The renderer paints it every frame; tests
/// inspect it directly.
#[derive(Debug, Clone)]
pub struct BoardCanvas {
    rows: usize,
    cols: usize,
    cells: Vec<u8>,
    /// Number of completed redraws, so observers can tell the picture changed
    frames: u64,
}

impl BoardCanvas {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![EMPTY; rows * cols],
            frames: 0,
        }
    }

    /// Wraps a new canvas for sharing with a controller while keeping the
    /// concrete type for the renderer.
    pub fn shared(rows: usize, cols: usize) -> Arc<Mutex<BoardCanvas>> {
        Arc::new(Mutex::new(Self::new(rows, cols)))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        if row < self.rows && col < self.cols {
            self.cells[row * self.cols + col]
        } else {
            EMPTY
        }
    }

    pub fn painted_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != EMPTY).count()
    }

    fn paint(&mut self, x: i32, y: i32, squares: &[Square], code: Option<u8>) {
        for square in squares {
            let row = square.position.row + y;
            let col = square.position.col + x;
            if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
                continue;
            }
            let index = row as usize * self.cols + col as usize;
            self.cells[index] = code.unwrap_or(square.code);
        }
    }
}

impl BoardDisplay for BoardCanvas {
    fn draw_block(&mut self, x: i32, y: i32, squares: &[Square]) {
        self.paint(x, y, squares, None);
        self.frames += 1;
    }

    fn undraw_block(&mut self, x: i32, y: i32, squares: &[Square]) {
        self.paint(x, y, squares, Some(EMPTY));
    }

    fn clear_board(&mut self) {
        self.cells.fill(EMPTY);
    }
}
