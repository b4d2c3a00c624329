//! Settled-square storage shared by live boards and snapshots

use crate::block::{Position, PENALTY_CODE};
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const EMPTY: u8 = 0;

/// Fixed-size row-major grid of settled cells. 0 marks an empty cell, any
/// other value is the code of the shape that settled there.
///
/// `cells.len() == rows * cols` always holds, including for grids decoded
/// from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a {rows}x{cols} grid cannot hold {cells} cells")]
pub struct GridSizeError {
    pub rows: usize,
    pub cols: usize,
    pub cells: usize,
}

impl<'de> Deserialize<'de> for Grid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename = "Grid")]
        struct RawGrid {
            rows: usize,
            cols: usize,
            cells: Vec<u8>,
        }

        let raw = RawGrid::deserialize(deserializer)?;
        Grid::from_cells(raw.rows, raw.cols, raw.cells).map_err(de::Error::custom)
    }
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![EMPTY; rows * cols],
        }
    }

    /// Builds a grid from existing cell contents, row 0 first
    pub fn from_cells(rows: usize, cols: usize, cells: Vec<u8>) -> Result<Self, GridSizeError> {
        if rows.checked_mul(cols) != Some(cells.len()) {
            return Err(GridSizeError {
                rows,
                cols,
                cells: cells.len(),
            });
        }
        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Flattened cell contents, row 0 first
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        position.row >= 0
            && position.col >= 0
            && (position.row as usize) < self.rows
            && (position.col as usize) < self.cols
    }

    /// Code at `position`, or None when outside the grid
    pub fn get(&self, position: Position) -> Option<u8> {
        if self.in_bounds(position) {
            Some(self.cells[self.index(position.row as usize, position.col as usize)])
        } else {
            None
        }
    }

    pub fn is_occupied(&self, position: Position) -> bool {
        matches!(self.get(position), Some(code) if code != EMPTY)
    }

    /// Writes `code` into the cell. Out-of-bounds positions are ignored.
    pub fn set(&mut self, position: Position, code: u8) {
        if self.in_bounds(position) {
            let index = self.index(position.row as usize, position.col as usize);
            self.cells[index] = code;
        }
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    fn row(&self, row: usize) -> &[u8] {
        let start = row * self.cols;
        &self.cells[start..start + self.cols]
    }

    pub fn is_row_full(&self, row: usize) -> bool {
        row < self.rows && self.row(row).iter().all(|cell| *cell != EMPTY)
    }

    /// Indices of full rows, top to bottom
    pub fn full_rows(&self) -> Vec<usize> {
        (0..self.rows).filter(|row| self.is_row_full(*row)).collect()
    }

    pub fn num_full_rows(&self) -> usize {
        (0..self.rows).filter(|row| self.is_row_full(*row)).count()
    }

    /// Number of non-empty cells
    pub fn settled_count(&self) -> usize {
        self.cells.iter().filter(|cell| **cell != EMPTY).count()
    }

    /// Removes `row`, shifting every row above it down by one and leaving an
    /// empty row at the top.
    pub fn clear_row(&mut self, row: usize) {
        if row >= self.rows {
            return;
        }
        self.cells.copy_within(0..row * self.cols, self.cols);
        self.cells[..self.cols].fill(EMPTY);
    }

    /// Removes every full row. Returns how many were removed.
    pub fn clear_full_rows(&mut self) -> usize {
        let mut cleared = 0;
        let mut row = self.rows;
        while row > 0 {
            let current = row - 1;
            if self.is_row_full(current) {
                // The row that slid into `current` still needs checking.
                self.clear_row(current);
                cleared += 1;
            } else {
                row -= 1;
            }
        }
        cleared
    }

    /// Removes only the lowest full row. Used to step a clear animation one
    /// row at a time. Returns false when no row was full.
    pub fn clear_lowest_full_row(&mut self) -> bool {
        match (0..self.rows).rev().find(|row| self.is_row_full(*row)) {
            Some(row) => {
                self.clear_row(row);
                true
            }
            None => false,
        }
    }

    /// Pushes `count` penalty rows in from the bottom, each filled except for
    /// `hole_col`. Everything else moves up; returns the number of occupied
    /// cells pushed off the top.
    pub fn push_penalty_rows(&mut self, count: usize, hole_col: usize) -> usize {
        let count = count.min(self.rows);
        if count == 0 {
            return 0;
        }
        let shifted = count * self.cols;
        let lost = self.cells[..shifted]
            .iter()
            .filter(|cell| **cell != EMPTY)
            .count();
        self.cells.copy_within(shifted.., 0);

        let first_new = (self.rows - count) * self.cols;
        for (offset, cell) in self.cells[first_new..].iter_mut().enumerate() {
            *cell = if offset % self.cols == hole_col {
                EMPTY
            } else {
                PENALTY_CODE
            };
        }
        lost
    }

    /// Occupied cells with their codes, top to bottom
    pub fn occupied(&self) -> impl Iterator<Item = (Position, u8)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, code)| **code != EMPTY)
            .map(move |(index, code)| {
                (
                    Position::new((index / self.cols) as i32, (index % self.cols) as i32),
                    *code,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_row(grid: &mut Grid, row: usize, code: u8) {
        for col in 0..grid.cols() {
            grid.set(Position::new(row as i32, col as i32), code);
        }
    }

    #[test]
    fn test_from_cells_checks_size() {
        let grid = Grid::from_cells(2, 2, vec![0, 3, 3, 3]).unwrap();
        assert_eq!(grid.num_full_rows(), 1);
        assert_eq!(grid.settled_count(), 3);

        let err = Grid::from_cells(20, 10, Vec::new()).unwrap_err();
        assert_eq!(err.cells, 0);
        assert!(Grid::from_cells(usize::MAX, 2, Vec::new()).is_err());
    }

    #[test]
    fn test_decoding_rejects_inconsistent_cells() {
        let grid = Grid::new(20, 10);
        let encoded = bincode::serialize(&grid).unwrap();
        assert_eq!(bincode::deserialize::<Grid>(&encoded).unwrap(), grid);

        // Same rows and cols, but the cell vector claims to be empty.
        let mut tampered = encoded[..16].to_vec();
        tampered.extend_from_slice(&0u64.to_le_bytes());
        assert!(bincode::deserialize::<Grid>(&tampered).is_err());
    }

    #[test]
    fn test_new_grid_is_empty() {
        let grid = Grid::new(4, 3);
        assert_eq!(grid.cells().len(), 12);
        assert_eq!(grid.settled_count(), 0);
        assert_eq!(grid.num_full_rows(), 0);
    }

    #[test]
    fn test_bounds() {
        let grid = Grid::new(4, 3);
        assert!(grid.in_bounds(Position::new(0, 0)));
        assert!(grid.in_bounds(Position::new(3, 2)));
        assert!(!grid.in_bounds(Position::new(-1, 0)));
        assert!(!grid.in_bounds(Position::new(4, 0)));
        assert!(!grid.in_bounds(Position::new(0, -1)));
        assert!(!grid.in_bounds(Position::new(0, 3)));
        assert_eq!(grid.get(Position::new(9, 9)), None);
    }

    #[test]
    fn test_clear_row_shifts_rows_down() {
        let mut grid = Grid::new(4, 3);
        grid.set(Position::new(0, 1), 5);
        grid.set(Position::new(1, 0), 2);
        fill_row(&mut grid, 2, 1);

        grid.clear_row(2);

        assert_eq!(grid.get(Position::new(0, 1)), Some(EMPTY));
        assert_eq!(grid.get(Position::new(1, 1)), Some(5));
        assert_eq!(grid.get(Position::new(2, 0)), Some(2));
        assert_eq!(grid.settled_count(), 2);
    }

    #[test]
    fn test_clear_full_rows_handles_adjacent_rows() {
        let mut grid = Grid::new(5, 2);
        grid.set(Position::new(1, 0), 7);
        fill_row(&mut grid, 2, 1);
        fill_row(&mut grid, 3, 1);
        grid.set(Position::new(4, 1), 3);
        fill_row(&mut grid, 0, 4);

        let cleared = grid.clear_full_rows();

        assert_eq!(cleared, 3);
        assert_eq!(grid.num_full_rows(), 0);
        assert_eq!(grid.get(Position::new(3, 0)), Some(7));
        assert_eq!(grid.get(Position::new(4, 1)), Some(3));
        assert_eq!(grid.settled_count(), 2);
    }

    #[test]
    fn test_clear_lowest_full_row_one_step_at_a_time() {
        let mut grid = Grid::new(4, 2);
        fill_row(&mut grid, 2, 1);
        fill_row(&mut grid, 3, 1);
        assert_eq!(grid.num_full_rows(), 2);

        assert!(grid.clear_lowest_full_row());
        assert_eq!(grid.num_full_rows(), 1);
        assert!(grid.clear_lowest_full_row());
        assert_eq!(grid.num_full_rows(), 0);
        assert!(!grid.clear_lowest_full_row());
    }

    #[test]
    fn test_penalty_rows_push_up_with_hole() {
        let mut grid = Grid::new(4, 3);
        grid.set(Position::new(0, 0), 2);
        grid.set(Position::new(3, 1), 4);

        let lost = grid.push_penalty_rows(1, 2);

        assert_eq!(lost, 1);
        assert_eq!(grid.get(Position::new(2, 1)), Some(4));
        assert_eq!(grid.get(Position::new(3, 0)), Some(PENALTY_CODE));
        assert_eq!(grid.get(Position::new(3, 1)), Some(PENALTY_CODE));
        assert_eq!(grid.get(Position::new(3, 2)), Some(EMPTY));
        assert!(!grid.is_row_full(3));
    }

    #[test]
    fn test_occupied_lists_cells() {
        let mut grid = Grid::new(2, 2);
        grid.set(Position::new(1, 0), 6);
        let occupied: Vec<_> = grid.occupied().collect();
        assert_eq!(occupied, vec![(Position::new(1, 0), 6)]);
    }
}
