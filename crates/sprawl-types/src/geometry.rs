//! Grid extents and tile windows.
//!
//! Every raster in a run shares a single [`GridShape`]; the tiled probability
//! assembler partitions that extent into [`TileRect`] windows. Cells are
//! addressed `(row, col)` with row-major storage order.

use serde::{Deserialize, Serialize};

/// The extent of a raster grid in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl GridShape {
    /// Create a shape from row and column counts.
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells in the extent.
    pub const fn cell_count(self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Whether the extent contains no cells.
    pub const fn is_empty(self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Whether the cell `(row, col)` lies inside the extent.
    pub const fn contains(self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// Row-major linear index of `(row, col)`, or `None` if out of bounds.
    pub fn index_of(self, row: usize, col: usize) -> Option<usize> {
        if !self.contains(row, col) {
            return None;
        }
        row.checked_mul(self.cols)?.checked_add(col)
    }
}

impl core::fmt::Display for GridShape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// A rectangular sub-window of a grid extent.
///
/// Produced by the tile partitioner: offsets locate the window inside the
/// full extent, and `height`/`width` are the *actual* (possibly clipped)
/// dimensions -- never the nominal tile size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    /// Row of the window's top-left cell in the full extent.
    pub row_offset: usize,
    /// Column of the window's top-left cell in the full extent.
    pub col_offset: usize,
    /// Window height in cells (clipped at the grid edge).
    pub height: usize,
    /// Window width in cells (clipped at the grid edge).
    pub width: usize,
}

impl TileRect {
    /// Create a tile window.
    pub const fn new(row_offset: usize, col_offset: usize, height: usize, width: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            height,
            width,
        }
    }

    /// Number of cells in the window.
    pub const fn cell_count(self) -> usize {
        self.height.saturating_mul(self.width)
    }

    /// The window's own shape, detached from the parent extent.
    pub const fn shape(self) -> GridShape {
        GridShape::new(self.height, self.width)
    }
}

impl core::fmt::Display for TileRect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}x{}@({},{})",
            self.height, self.width, self.row_offset, self.col_offset
        )
    }
}
