//! Neighborhood influence estimation.
//!
//! Urban growth attracts urban growth: a cell surrounded by built-up
//! neighbors is likelier to convert than an isolated one. This module
//! smooths the current urban mask with a fixed 5x5 kernel to produce a
//! continuous "local urban pressure" surface. The weights are a constant
//! table (mean exactly 0.5 with a small centre-peaked spread), initialized
//! once and never updated -- not a learned parameter of this engine.
//!
//! The output range depends on how many urban neighbors a cell has; it is
//! *not* a probability and is combined multiplicatively downstream.

use sprawl_raster::kernel::KERNEL_SIZE;
use sprawl_raster::{Kernel, Mask, RasterError, RasterGrid};

/// Fixed smoothing weights: mean exactly 0.5 with a small centre-peaked
/// spread.
const SMOOTHING_WEIGHTS: [[f32; KERNEL_SIZE]; KERNEL_SIZE] = [
    [0.48, 0.49, 0.50, 0.49, 0.48],
    [0.49, 0.51, 0.52, 0.51, 0.49],
    [0.50, 0.52, 0.54, 0.52, 0.50],
    [0.49, 0.51, 0.52, 0.51, 0.49],
    [0.48, 0.49, 0.50, 0.49, 0.48],
];

/// Estimator producing the smoothed local-urban-density surface.
#[derive(Debug, Clone)]
pub struct NeighborhoodInfluence {
    /// The fixed smoothing kernel.
    kernel: Kernel,
}

impl NeighborhoodInfluence {
    /// Create the estimator with the fixed smoothing weights.
    pub const fn new() -> Self {
        Self {
            kernel: Kernel::new(SMOOTHING_WEIGHTS),
        }
    }

    /// Compute the influence surface from the current urban mask.
    ///
    /// The urban mask is smoothed as a 0/1 indicator with zero padding at
    /// the grid boundary, then zeroed outside the study-area validity mask
    /// so out-of-area cells neither receive nor contribute influence.
    ///
    /// Pure function of its inputs: calling twice with the same masks
    /// yields the same surface.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] if the masks disagree in
    /// extent.
    pub fn estimate(&self, urban: &Mask, valid: &Mask) -> Result<RasterGrid, RasterError> {
        self.kernel.apply(&urban.to_indicator(), valid)
    }
}

impl Default for NeighborhoodInfluence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use sprawl_types::GridShape;

    use super::*;

    #[test]
    fn weights_average_exactly_one_half() {
        let estimator = NeighborhoodInfluence::new();
        let sum: f32 = SMOOTHING_WEIGHTS.iter().flatten().sum();
        let count = (KERNEL_SIZE * KERNEL_SIZE) as f32;
        assert!((sum / count - 0.5).abs() < 1e-6);
        assert!((estimator.kernel.weight_sum() - 12.5).abs() < 1e-5);
    }

    #[test]
    fn isolated_urban_cell_spreads_bounded_influence() {
        let shape = GridShape::new(7, 7);
        let urban_grid = {
            let mut values = vec![0.0; shape.cell_count()];
            values[24] = 1.0; // centre (3, 3)
            RasterGrid::from_values(shape, values, None).unwrap()
        };
        let urban = Mask::from_grid(&urban_grid, |v| v > 0.5);
        let valid = Mask::filled(shape, true);

        let surface = NeighborhoodInfluence::new()
            .estimate(&urban, &valid)
            .unwrap();
        // The centre sees itself through the centre weight.
        assert!((surface.value_at(3, 3).unwrap() - 0.54).abs() < 1e-6);
        // A window-edge neighbor sees the corner weight.
        assert!((surface.value_at(1, 1).unwrap() - 0.48).abs() < 1e-6);
        // Outside the 5x5 window there is nothing.
        assert!(surface.value_at(0, 3).unwrap().abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_cells_receive_no_influence() {
        let shape = GridShape::new(5, 5);
        let urban_grid = {
            let mut values = vec![0.0; shape.cell_count()];
            values[12] = 1.0; // centre (2, 2)
            RasterGrid::from_values(shape, values, None).unwrap()
        };
        let urban = Mask::from_grid(&urban_grid, |v| v > 0.5);
        // Validity covers only the top row.
        let valid_grid = RasterGrid::from_values(
            shape,
            vec![
                1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            ],
            None,
        )
        .unwrap();
        let valid = Mask::from_grid(&valid_grid, |v| v > 0.5);

        let surface = NeighborhoodInfluence::new()
            .estimate(&urban, &valid)
            .unwrap();
        // Inside validity: influence from the urban cell two rows down.
        assert!(surface.value_at(0, 2).unwrap() > 0.0);
        // Outside validity: zeroed, even adjacent to the urban cell.
        assert!(surface.value_at(2, 1).unwrap().abs() < f32::EPSILON);
    }

    #[test]
    fn estimate_is_a_pure_function_of_its_inputs() {
        let shape = GridShape::new(6, 6);
        let urban_grid = {
            let mut values = vec![0.0; shape.cell_count()];
            values[7] = 1.0;
            values[14] = 1.0;
            RasterGrid::from_values(shape, values, None).unwrap()
        };
        let urban = Mask::from_grid(&urban_grid, |v| v > 0.5);
        let valid = Mask::filled(shape, true);

        let estimator = NeighborhoodInfluence::new();
        let a = estimator.estimate(&urban, &valid).unwrap();
        let b = estimator.estimate(&urban, &valid).unwrap();
        assert_eq!(a, b);
    }
}
