//! Boolean masks over the study area.
//!
//! A [`Mask`] selects a subset of cells of a grid extent. Masks are built
//! from predicates over raster values (or copied from a grid's validity
//! array), combined with set operators, and converted to 0/1 indicator
//! grids where a downstream computation wants numbers instead of booleans.

use serde::{Deserialize, Serialize};
use sprawl_types::GridShape;

use crate::error::RasterError;
use crate::grid::RasterGrid;

/// A boolean grid selecting cells of the study area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    /// The grid extent.
    shape: GridShape,
    /// Per-cell membership, row-major.
    bits: Vec<bool>,
}

impl Mask {
    /// Build a mask by applying a predicate to every cell value of a grid.
    ///
    /// The predicate sees raw cell values; it is not validity-aware.
    /// Combine with [`Mask::validity_of`] when no-data cells must be
    /// excluded.
    pub fn from_grid<P>(grid: &RasterGrid, predicate: P) -> Self
    where
        P: Fn(f32) -> bool,
    {
        Self {
            shape: grid.shape(),
            bits: grid.values().iter().map(|&v| predicate(v)).collect(),
        }
    }

    /// Copy a grid's validity array into a mask.
    pub fn validity_of(grid: &RasterGrid) -> Self {
        Self {
            shape: grid.shape(),
            bits: grid.validity().to_vec(),
        }
    }

    /// Build a mask with every cell set to the given value.
    pub fn filled(shape: GridShape, value: bool) -> Self {
        Self {
            shape,
            bits: vec![value; shape.cell_count()],
        }
    }

    /// The grid extent.
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Per-cell membership flags, row-major.
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Membership at a linear cell index. Out-of-bounds indices are not
    /// members.
    pub fn get(&self, idx: usize) -> bool {
        self.bits.get(idx).copied().unwrap_or(false)
    }

    /// Membership at `(row, col)`. Out-of-bounds cells are not members.
    pub fn get_at(&self, row: usize, col: usize) -> bool {
        self.shape
            .index_of(row, col)
            .map(|idx| self.get(idx))
            .unwrap_or(false)
    }

    /// Number of member cells.
    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Linear indices of all member cells, ascending.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(idx, &b)| b.then_some(idx))
    }

    /// Intersection with another mask.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] if the extents differ.
    pub fn and(&self, other: &Self) -> Result<Self, RasterError> {
        self.ensure_same_shape(other)?;
        Ok(Self {
            shape: self.shape,
            bits: self
                .bits
                .iter()
                .zip(other.bits.iter())
                .map(|(&a, &b)| a && b)
                .collect(),
        })
    }

    /// Set difference: members of `self` that are not members of `other`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] if the extents differ.
    pub fn and_not(&self, other: &Self) -> Result<Self, RasterError> {
        self.ensure_same_shape(other)?;
        Ok(Self {
            shape: self.shape,
            bits: self
                .bits
                .iter()
                .zip(other.bits.iter())
                .map(|(&a, &b)| a && !b)
                .collect(),
        })
    }

    /// Convert to a fully-valid 0/1 indicator grid.
    pub fn to_indicator(&self) -> RasterGrid {
        let values = self
            .bits
            .iter()
            .map(|&b| if b { 1.0 } else { 0.0 })
            .collect();
        // Buffers are sized from the shared shape, so this cannot fail.
        RasterGrid::from_values(self.shape, values, None)
            .unwrap_or_else(|_| RasterGrid::filled(self.shape, 0.0))
    }

    const fn ensure_same_shape(&self, other: &Self) -> Result<(), RasterError> {
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
