//! Viewport sampling: read the visible window out of a strip.
//!
//! The strip is treated as if padded by `cols` blank columns on both sides.
//! At offset 0 the window sits entirely in the right padding; each step of
//! the offset moves it one column left along the strip, so text enters from
//! the right edge and leaves past the left edge.

use crate::ViewportConfig;
use crate::strip::Strip;
use std::fmt;

/// Lit/unlit cells of the visible window, `rows` by `cols`, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl Grid {
    /// A grid with every cell unlit.
    pub fn blank(viewport: ViewportConfig) -> Self {
        Self {
            rows: viewport.rows,
            cols: viewport.cols,
            cells: vec![false; viewport.cell_count()],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Whether `(row, col)` is lit. Out of range is unlit.
    pub fn lit(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols && self.cells[row * self.cols + col]
    }

    /// Cells one row at a time, top to bottom.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[bool]> {
        self.cells.chunks(self.cols.max(1)).take(self.rows)
    }

    pub fn lit_count(&self) -> usize {
        self.cells.iter().filter(|lit| **lit).count()
    }

    pub fn is_blank(&self) -> bool {
        self.lit_count() == 0
    }

    /// Rows of 0/1 values, the shape the HTTP API serves.
    pub fn to_bits(&self) -> Vec<Vec<u8>> {
        self.iter_rows()
            .map(|row| row.iter().map(|&lit| u8::from(lit)).collect())
            .collect()
    }
}

/// One line per row, `#` for lit and `.` for unlit.
impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.iter_rows().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for &lit in row {
                f.write_str(if lit { "#" } else { "." })?;
            }
        }
        Ok(())
    }
}

/// Sample the window of `strip` visible at `offset`.
///
/// Viewport column `c` reads strip column `c + offset - viewport.cols`;
/// anything outside the strip is unlit, so a zero-width strip always gives
/// a blank grid.
pub fn sample(strip: &Strip, offset: usize, viewport: ViewportConfig) -> Grid {
    let mut grid = Grid::blank(viewport);
    let shift = offset as isize - viewport.cols as isize;

    for row in 0..viewport.rows {
        for col in 0..viewport.cols {
            if strip.lit(row as isize, col as isize + shift) {
                grid.cells[row * viewport.cols + col] = true;
            }
        }
    }

    grid
}
