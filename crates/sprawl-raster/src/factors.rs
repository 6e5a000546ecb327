//! Driver-factor normalization.
//!
//! A [`NormalizedFactorStack`] holds the co-registered driver layers the
//! prediction oracle consumes, each independently rescaled to [0,1] using
//! that factor's own observed minimum and maximum. The per-factor
//! [`FactorRange`] statistics are recorded on the stack as an immutable
//! diagnostic artifact -- an explicit result object owned by the caller,
//! not process-wide shared state.
//!
//! # Normalization
//!
//! Per factor: no-data cells are undefined and excluded from statistics.
//! A factor flagged for log transform (in this domain, the straight-line
//! distance to the central business district, whose heavy right skew
//! benefits from compression near the urban core) applies `ln(1 + value)`
//! element-wise first; negative inputs become undefined rather than failing
//! the layer. Min/max are computed over defined cells only. A range
//! numerically indistinguishable from zero degenerates to `value - min`
//! instead of dividing by a near-zero span. Undefined cells emit 0.0 so
//! they cannot pollute downstream feature vectors, and a layer with no
//! defined cells at all is rejected outright.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sprawl_types::{FactorId, GridShape};
use tracing::debug;

use crate::error::RasterError;
use crate::grid::RasterGrid;
use crate::mask::Mask;

/// Normalized value at or above which a cell of the designated restricted
/// factor counts as a hard no-build zone. The source restricted layer is
/// near-binary before scaling, so its positive class lands at saturation.
pub const RESTRICTED_THRESHOLD: f32 = 0.99;

/// Observed value range of one factor, recorded before rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorRange {
    /// Minimum over defined cells (post-transform).
    pub min: f32,
    /// Maximum over defined cells (post-transform).
    pub max: f32,
}

/// One driver layer as ingested, before normalization.
#[derive(Debug, Clone)]
pub struct RawFactor {
    /// The factor's identifier; ascending id order is the canonical
    /// feature order.
    pub id: FactorId,
    /// The raw layer, with validity already derived from its own no-data
    /// sentinel.
    pub grid: RasterGrid,
    /// Whether to apply `ln(1 + value)` before computing statistics.
    pub log_transform: bool,
}

/// A set of co-registered driver layers rescaled to [0,1].
#[derive(Debug, Clone)]
pub struct NormalizedFactorStack {
    /// Shared extent of every member layer.
    shape: GridShape,
    /// Normalized layers keyed by factor id; iteration order is the
    /// canonical ascending-id feature order.
    layers: BTreeMap<FactorId, RasterGrid>,
    /// Recorded pre-scaling statistics per factor.
    ranges: BTreeMap<FactorId, FactorRange>,
}

impl NormalizedFactorStack {
    /// Normalize a set of raw factors into a stack.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::EmptyStack`] for zero layers,
    /// [`RasterError::DuplicateFactor`] on a repeated id,
    /// [`RasterError::DimensionMismatch`] when layers disagree in extent,
    /// and [`RasterError::InvalidFactor`] when a layer has no defined cells.
    pub fn from_raw(factors: Vec<RawFactor>) -> Result<Self, RasterError> {
        let Some(first) = factors.first() else {
            return Err(RasterError::EmptyStack);
        };
        let shape = first.grid.shape();

        let mut layers = BTreeMap::new();
        let mut ranges = BTreeMap::new();
        for raw in &factors {
            if raw.grid.shape() != shape {
                return Err(RasterError::DimensionMismatch {
                    expected: shape,
                    found: raw.grid.shape(),
                });
            }
            if layers.contains_key(&raw.id) {
                return Err(RasterError::DuplicateFactor { factor: raw.id });
            }
            let (layer, range) = normalize_factor(raw)?;
            debug!(
                factor = %raw.id,
                min = range.min,
                max = range.max,
                log_transform = raw.log_transform,
                "factor normalized"
            );
            layers.insert(raw.id, layer);
            ranges.insert(raw.id, range);
        }

        Ok(Self {
            shape,
            layers,
            ranges,
        })
    }

    /// Shared extent of the member layers.
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Number of member layers.
    pub fn factor_count(&self) -> usize {
        self.layers.len()
    }

    /// Factor identifiers in ascending (canonical feature) order.
    pub fn factor_ids(&self) -> Vec<FactorId> {
        self.layers.keys().copied().collect()
    }

    /// Iterate over layers in ascending factor-id order.
    pub fn layers(&self) -> impl Iterator<Item = (FactorId, &RasterGrid)> {
        self.layers.iter().map(|(&id, layer)| (id, layer))
    }

    /// The normalized layer for a factor, if present.
    pub fn layer(&self, id: FactorId) -> Option<&RasterGrid> {
        self.layers.get(&id)
    }

    /// The recorded statistics for a factor, if present.
    pub fn range(&self, id: FactorId) -> Option<FactorRange> {
        self.ranges.get(&id).copied()
    }

    /// Recorded statistics for every factor, in ascending-id order.
    pub fn ranges(&self) -> impl Iterator<Item = (FactorId, FactorRange)> + '_ {
        self.ranges.iter().map(|(&id, &range)| (id, range))
    }

    /// Derive the hard no-build mask from the designated restricted factor.
    ///
    /// A cell is restricted where the factor's normalized value reaches
    /// [`RESTRICTED_THRESHOLD`].
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::UnknownFactor`] if the stack has no layer
    /// with the given id.
    pub fn restricted_mask(&self, id: FactorId) -> Result<Mask, RasterError> {
        let layer = self
            .layers
            .get(&id)
            .ok_or(RasterError::UnknownFactor { factor: id })?;
        Ok(Mask::from_grid(layer, |v| v >= RESTRICTED_THRESHOLD))
    }
}

/// Normalize one factor layer, returning the rescaled grid and its
/// recorded range.
fn normalize_factor(raw: &RawFactor) -> Result<(RasterGrid, FactorRange), RasterError> {
    let shape = raw.grid.shape();

    // Transform pass: carry (value, defined) per cell. No-data cells and
    // negative log inputs are undefined and must not touch the statistics.
    let transformed: Vec<(f32, bool)> = raw
        .grid
        .values()
        .iter()
        .zip(raw.grid.validity().iter())
        .map(|(&value, &valid)| {
            if !valid {
                return (0.0, false);
            }
            if raw.log_transform {
                if value < 0.0 {
                    return (0.0, false);
                }
                (value.ln_1p(), true)
            } else {
                (value, true)
            }
        })
        .collect();

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut any_defined = false;
    for &(value, defined) in &transformed {
        if defined {
            any_defined = true;
            min = min.min(value);
            max = max.max(value);
        }
    }
    if !any_defined {
        return Err(RasterError::InvalidFactor { factor: raw.id });
    }

    let range = max - min;
    let degenerate = range.abs() < f32::EPSILON;
    let mut values = Vec::with_capacity(transformed.len());
    let mut valid = Vec::with_capacity(transformed.len());
    for &(value, defined) in &transformed {
        if defined {
            let scaled = if degenerate {
                value - min
            } else {
                (value - min) / range
            };
            values.push(scaled);
        } else {
            values.push(0.0);
        }
        valid.push(defined);
    }

    let layer = RasterGrid::from_parts(shape, values, valid)?;
    Ok((layer, FactorRange { min, max }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SHAPE: GridShape = GridShape::new(2, 2);

    fn raw(id: u16, values: Vec<f32>, nodata: Option<f32>, log_transform: bool) -> RawFactor {
        RawFactor {
            id: FactorId::new(id),
            grid: RasterGrid::from_values(SHAPE, values, nodata).unwrap(),
            log_transform,
        }
    }

    #[test]
    fn round_trip_hits_zero_at_min_and_one_at_max() {
        let stack =
            NormalizedFactorStack::from_raw(vec![raw(1, vec![10.0, 20.0, 30.0, 40.0], None, false)])
                .unwrap();
        let layer = stack.layer(FactorId::new(1)).unwrap();
        assert!(layer.values()[0].abs() < f32::EPSILON);
        assert!((layer.values()[3] - 1.0).abs() < f32::EPSILON);
        let range = stack.range(FactorId::new(1)).unwrap();
        assert!((range.min - 10.0).abs() < f32::EPSILON);
        assert!((range.max - 40.0).abs() < f32::EPSILON);
    }

    #[test]
    fn no_data_cells_are_excluded_from_statistics_and_emit_zero() {
        let stack = NormalizedFactorStack::from_raw(vec![raw(
            1,
            vec![-9999.0, 10.0, 25.0, 40.0],
            Some(-9999.0),
            false,
        )])
        .unwrap();
        let layer = stack.layer(FactorId::new(1)).unwrap();
        // Sentinel cell did not drag the minimum down to -9999.
        let range = stack.range(FactorId::new(1)).unwrap();
        assert!((range.min - 10.0).abs() < f32::EPSILON);
        // And it emits 0, flagged undefined.
        assert!(layer.values()[0].abs() < f32::EPSILON);
        assert!(!layer.validity()[0]);
        assert!((layer.values()[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn constant_factor_degenerates_to_all_zero() {
        let stack =
            NormalizedFactorStack::from_raw(vec![raw(1, vec![7.0; 4], None, false)]).unwrap();
        let layer = stack.layer(FactorId::new(1)).unwrap();
        assert!(layer.values().iter().all(|v| v.abs() < f32::EPSILON));
    }

    #[test]
    fn log_transform_compresses_and_rejects_negatives_per_cell() {
        let stack = NormalizedFactorStack::from_raw(vec![raw(
            2,
            vec![-1.0, 0.0, 9.0, 99.0],
            None,
            true,
        )])
        .unwrap();
        let layer = stack.layer(FactorId::new(2)).unwrap();
        // Negative input is undefined, not an error for the whole layer.
        assert!(!layer.validity()[0]);
        assert!(layer.values()[0].abs() < f32::EPSILON);
        // Statistics come from ln1p of the non-negative cells: 0..ln(100).
        let range = stack.range(FactorId::new(2)).unwrap();
        assert!(range.min.abs() < f32::EPSILON);
        assert!((range.max - 100.0_f32.ln()).abs() < 1e-6);
        // ln(10)/ln(100) = 0.5 exactly.
        assert!((layer.values()[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn all_undefined_layer_is_invalid() {
        let err = NormalizedFactorStack::from_raw(vec![raw(
            3,
            vec![-9999.0; 4],
            Some(-9999.0),
            false,
        )])
        .unwrap_err();
        assert!(matches!(
            err,
            RasterError::InvalidFactor { factor } if factor == FactorId::new(3)
        ));
    }

    #[test]
    fn duplicate_and_unknown_ids_are_rejected() {
        let err = NormalizedFactorStack::from_raw(vec![
            raw(1, vec![0.0, 1.0, 2.0, 3.0], None, false),
            raw(1, vec![0.0, 1.0, 2.0, 3.0], None, false),
        ])
        .unwrap_err();
        assert!(matches!(err, RasterError::DuplicateFactor { .. }));

        let stack =
            NormalizedFactorStack::from_raw(vec![raw(1, vec![0.0, 1.0, 2.0, 3.0], None, false)])
                .unwrap();
        assert!(matches!(
            stack.restricted_mask(FactorId::new(9)),
            Err(RasterError::UnknownFactor { .. })
        ));
    }

    #[test]
    fn mismatched_layer_extents_are_rejected() {
        let other = RawFactor {
            id: FactorId::new(2),
            grid: RasterGrid::filled(GridShape::new(3, 3), 1.0),
            log_transform: false,
        };
        let err = NormalizedFactorStack::from_raw(vec![
            raw(1, vec![0.0, 1.0, 2.0, 3.0], None, false),
            other,
        ])
        .unwrap_err();
        assert!(matches!(err, RasterError::DimensionMismatch { .. }));
    }

    #[test]
    fn restricted_mask_selects_saturated_cells() {
        // Near-binary source layer: zeros and a single large magnitude.
        let stack = NormalizedFactorStack::from_raw(vec![raw(
            6,
            vec![0.0, 0.0, 1000.0, 1000.0],
            None,
            false,
        )])
        .unwrap();
        let restricted = stack.restricted_mask(FactorId::new(6)).unwrap();
        assert_eq!(restricted.iter_ones().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn empty_stack_is_rejected() {
        assert!(matches!(
            NormalizedFactorStack::from_raw(vec![]),
            Err(RasterError::EmptyStack)
        ));
    }

    #[test]
    fn canonical_order_is_ascending_factor_id() {
        let stack = NormalizedFactorStack::from_raw(vec![
            raw(4, vec![0.0, 1.0, 2.0, 3.0], None, false),
            raw(2, vec![0.0, 1.0, 2.0, 3.0], None, false),
        ])
        .unwrap();
        assert_eq!(
            stack.factor_ids(),
            vec![FactorId::new(2), FactorId::new(4)]
        );
    }
}
