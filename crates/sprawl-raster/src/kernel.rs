//! Fixed small linear smoothing kernel.
//!
//! A [`Kernel`] holds a 5x5 weight table and applies it as a linear filter
//! over a grid. Filtering zero-pads at the grid boundary -- cells outside
//! the extent contribute nothing, and the window never wraps to the
//! opposite edge -- and the output is zeroed outside a caller-supplied
//! domain mask, so cells beyond the study area neither receive nor leak
//! influence.

use sprawl_types::GridShape;

use crate::error::RasterError;
use crate::grid::RasterGrid;
use crate::mask::Mask;

/// Kernel side length in cells.
pub const KERNEL_SIZE: usize = 5;

/// Half-width of the kernel window.
const RADIUS: usize = KERNEL_SIZE / 2;

/// A 5x5 linear filter with fixed weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    /// Weight table, `weights[kr][kc]` applied to the neighbor at offset
    /// `(kr - 2, kc - 2)`.
    weights: [[f32; KERNEL_SIZE]; KERNEL_SIZE],
}

impl Kernel {
    /// Create a kernel from an explicit weight table.
    pub const fn new(weights: [[f32; KERNEL_SIZE]; KERNEL_SIZE]) -> Self {
        Self { weights }
    }

    /// The weight table.
    pub const fn weights(&self) -> &[[f32; KERNEL_SIZE]; KERNEL_SIZE] {
        &self.weights
    }

    /// Sum of all weights.
    pub fn weight_sum(&self) -> f32 {
        self.weights.iter().flatten().sum()
    }

    /// Apply the filter to `input`, zeroing output cells outside `domain`.
    ///
    /// The returned grid carries `domain` as its validity array.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] if `domain` does not share
    /// the input extent.
    pub fn apply(&self, input: &RasterGrid, domain: &Mask) -> Result<RasterGrid, RasterError> {
        let shape = input.shape();
        if domain.shape() != shape {
            return Err(RasterError::DimensionMismatch {
                expected: shape,
                found: domain.shape(),
            });
        }

        let mut values = Vec::with_capacity(shape.cell_count());
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                if domain.get_at(row, col) {
                    values.push(self.window_sum(input, shape, row, col));
                } else {
                    values.push(0.0);
                }
            }
        }
        RasterGrid::from_parts(shape, values, domain.bits().to_vec())
    }

    /// Weighted sum of the 5x5 window centred on `(row, col)`.
    ///
    /// Neighbors outside the extent are skipped, which is equivalent to
    /// zero padding.
    fn window_sum(&self, input: &RasterGrid, shape: GridShape, row: usize, col: usize) -> f32 {
        let mut sum = 0.0_f32;
        for (kr, weight_row) in self.weights.iter().enumerate() {
            let Some(nr) = row.saturating_add(kr).checked_sub(RADIUS) else {
                continue;
            };
            if nr >= shape.rows {
                continue;
            }
            for (kc, &weight) in weight_row.iter().enumerate() {
                let Some(nc) = col.saturating_add(kc).checked_sub(RADIUS) else {
                    continue;
                };
                if let Some(value) = input.value_at(nr, nc) {
                    sum += weight * value;
                }
            }
        }
        sum
    }
}
