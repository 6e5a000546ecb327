//! Single-band raster grids with per-cell validity.
//!
//! A [`RasterGrid`] is a rectangular array of 32-bit floating values in
//! row-major order plus a boolean validity array. Validity is derived at
//! construction from a caller-supplied no-data sentinel -- the sentinel is
//! parameterized per call (categorical land cover conventionally uses 0,
//! continuous factor layers -9999) and is never mixed back into the value
//! band once the validity array exists.

use serde::{Deserialize, Serialize};
use sprawl_types::GridShape;

use crate::error::RasterError;

/// A row-major `f32` grid with a validity array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    /// The grid extent.
    shape: GridShape,
    /// Cell values, row-major, `shape.cell_count()` entries.
    values: Vec<f32>,
    /// Per-cell validity; `false` marks no-data cells.
    valid: Vec<bool>,
}

impl RasterGrid {
    /// Build a grid from raw values, deriving validity from a no-data
    /// sentinel.
    ///
    /// A cell is invalid when its value is indistinguishable from the
    /// sentinel. Passing `None` marks every cell valid.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::LengthMismatch`] if `values` does not hold
    /// exactly one value per cell.
    pub fn from_values(
        shape: GridShape,
        values: Vec<f32>,
        nodata: Option<f32>,
    ) -> Result<Self, RasterError> {
        if values.len() != shape.cell_count() {
            return Err(RasterError::LengthMismatch {
                expected: shape.cell_count(),
                found: values.len(),
            });
        }
        let valid = match nodata {
            Some(sentinel) => values
                .iter()
                .map(|&v| (v - sentinel).abs() >= f32::EPSILON)
                .collect(),
            None => vec![true; values.len()],
        };
        Ok(Self {
            shape,
            values,
            valid,
        })
    }

    /// Build a grid from values and an explicit validity array.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::LengthMismatch`] if either buffer does not
    /// hold exactly one entry per cell.
    pub fn from_parts(
        shape: GridShape,
        values: Vec<f32>,
        valid: Vec<bool>,
    ) -> Result<Self, RasterError> {
        if values.len() != shape.cell_count() {
            return Err(RasterError::LengthMismatch {
                expected: shape.cell_count(),
                found: values.len(),
            });
        }
        if valid.len() != shape.cell_count() {
            return Err(RasterError::LengthMismatch {
                expected: shape.cell_count(),
                found: valid.len(),
            });
        }
        Ok(Self {
            shape,
            values,
            valid,
        })
    }

    /// Build a fully-valid grid filled with a constant value.
    pub fn filled(shape: GridShape, value: f32) -> Self {
        Self {
            shape,
            values: vec![value; shape.cell_count()],
            valid: vec![true; shape.cell_count()],
        }
    }

    /// The grid extent.
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Cell values in row-major order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Per-cell validity flags in row-major order.
    pub fn validity(&self) -> &[bool] {
        &self.valid
    }

    /// Value at `(row, col)`, or `None` if out of bounds.
    pub fn value_at(&self, row: usize, col: usize) -> Option<f32> {
        let idx = self.shape.index_of(row, col)?;
        self.values.get(idx).copied()
    }

    /// Whether the cell at `(row, col)` is valid. Out-of-bounds cells are
    /// not valid.
    pub fn valid_at(&self, row: usize, col: usize) -> bool {
        self.shape
            .index_of(row, col)
            .and_then(|idx| self.valid.get(idx).copied())
            .unwrap_or(false)
    }

    /// Overwrite the value at each of the given linear indices.
    ///
    /// Indices outside the grid are ignored. Validity flags are unchanged --
    /// rewriting a categorical class does not touch no-data bookkeeping.
    pub fn fill_cells(&mut self, indices: &[usize], value: f32) {
        for &idx in indices {
            if let Some(cell) = self.values.get_mut(idx) {
                *cell = value;
            }
        }
    }

    /// Check that another grid shares this grid's extent.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] if the extents differ.
    pub const fn ensure_same_shape(&self, other: &Self) -> Result<(), RasterError> {
        if self.shape.rows == other.shape.rows && self.shape.cols == other.shape.cols {
            Ok(())
        } else {
            Err(RasterError::DimensionMismatch {
                expected: self.shape,
                found: other.shape,
            })
        }
    }
}
