//! Mutable land-cover state and derived masks.
//!
//! [`LandCoverState`] bundles the three land-cover grids of a run: the
//! observed starting state, the observed future state the simulation aims
//! at, and the mutable working state. Masks that never change over a run
//! (study-area validity, the initially-non-urban baseline, hard no-build
//! restrictions) are frozen at construction; masks that track the working
//! state (the urban mask, the candidate pool) are recomputed on demand.
//!
//! Growth is monotone: the only mutation is [`LandCoverState::commit`],
//! which sets cells to the urban class. Nothing ever reverts a cell.

use sprawl_raster::{Mask, RasterError, RasterGrid};
use sprawl_types::{GridShape, URBAN_CODE, is_no_data, is_urban};

/// Land-cover grids and masks for one simulation run.
#[derive(Debug, Clone)]
pub struct LandCoverState {
    /// Shared extent of every grid and mask.
    shape: GridShape,
    /// Observed starting land cover (categorical codes, urban = 1).
    initial: RasterGrid,
    /// Observed future land cover, same encoding and extent.
    observed_future: RasterGrid,
    /// Mutable working state, initialized as a copy of `initial`.
    current: RasterGrid,
    /// Study-area validity: cells whose initial value is not the land-cover
    /// no-data code.
    valid: Mask,
    /// Hard no-build cells, derived from the restricted driver factor.
    restricted: Mask,
    /// Valid cells that were non-urban at the start. Frozen: this is both
    /// the eligibility baseline and the evaluation population.
    non_urban_at_start: Mask,
    /// Valid urban cells in `initial`.
    initial_urban_count: usize,
    /// Valid urban cells in `observed_future`.
    target_urban_count: usize,
}

impl LandCoverState {
    /// Build the state from the two observed grids and the restricted mask.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] if the grids or the mask
    /// disagree in extent.
    pub fn new(
        initial: RasterGrid,
        observed_future: RasterGrid,
        restricted: Mask,
    ) -> Result<Self, RasterError> {
        initial.ensure_same_shape(&observed_future)?;
        let shape = initial.shape();
        if restricted.shape() != shape {
            return Err(RasterError::DimensionMismatch {
                expected: shape,
                found: restricted.shape(),
            });
        }

        let valid = Mask::from_grid(&initial, |v| !is_no_data(v));
        let non_urban_at_start = Mask::from_grid(&initial, |v| !is_urban(v)).and(&valid)?;
        let initial_urban_count = Mask::from_grid(&initial, is_urban).and(&valid)?.count_ones();
        let target_urban_count = Mask::from_grid(&observed_future, is_urban)
            .and(&valid)?
            .count_ones();

        let current = initial.clone();
        Ok(Self {
            shape,
            initial,
            observed_future,
            current,
            valid,
            restricted,
            non_urban_at_start,
            initial_urban_count,
            target_urban_count,
        })
    }

    /// Shared extent of every grid and mask.
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// The observed starting land cover.
    pub const fn initial(&self) -> &RasterGrid {
        &self.initial
    }

    /// The observed future land cover.
    pub const fn observed_future(&self) -> &RasterGrid {
        &self.observed_future
    }

    /// The mutable working state.
    pub const fn current(&self) -> &RasterGrid {
        &self.current
    }

    /// Study-area validity mask.
    pub const fn valid_mask(&self) -> &Mask {
        &self.valid
    }

    /// Hard no-build mask.
    pub const fn restricted_mask(&self) -> &Mask {
        &self.restricted
    }

    /// Valid cells that were non-urban at the start (frozen baseline).
    pub const fn non_urban_at_start(&self) -> &Mask {
        &self.non_urban_at_start
    }

    /// Valid urban cells in the working state, recomputed from `current`.
    pub fn urban_mask(&self) -> Mask {
        // The masks share one extent; intersection cannot fail.
        Mask::from_grid(&self.current, is_urban)
            .and(&self.valid)
            .unwrap_or_else(|_| Mask::filled(self.shape, false))
    }

    /// Number of valid urban cells in the working state.
    pub fn urban_count(&self) -> usize {
        self.urban_mask().count_ones()
    }

    /// Valid urban cells in the observed starting state.
    pub const fn initial_urban_count(&self) -> usize {
        self.initial_urban_count
    }

    /// Valid urban cells in the observed future state.
    pub const fn target_urban_count(&self) -> usize {
        self.target_urban_count
    }

    /// Conversions needed at the start of a run:
    /// `max(target - initial, 0)`. Computed from the frozen counts, so it
    /// does not shrink as conversions are committed.
    pub const fn initial_deficit(&self) -> usize {
        self.target_urban_count.saturating_sub(self.initial_urban_count)
    }

    /// Conversions still needed right now, tracked through the evolving
    /// urban-mask count rather than a separately mutated counter.
    pub fn remaining_need(&self) -> usize {
        self.target_urban_count.saturating_sub(self.urban_count())
    }

    /// Cells eligible for conversion this iteration: currently non-urban,
    /// inside the study area, and not restricted.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] if the restricted mask
    /// extent disagrees (cannot happen for a constructed state).
    pub fn candidate_mask(&self) -> Result<Mask, RasterError> {
        Mask::from_grid(&self.current, |v| !is_urban(v))
            .and(&self.valid)?
            .and_not(&self.restricted)
    }

    /// Ground-truth transitions: valid cells that were non-urban at the
    /// start and urban in the observed future. Consumed only by the
    /// evaluator.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] on extent disagreement
    /// (cannot happen for a constructed state).
    pub fn transition_mask(&self) -> Result<Mask, RasterError> {
        Mask::from_grid(&self.observed_future, is_urban).and(&self.non_urban_at_start)
    }

    /// Commit conversions: set the given cells of the working state to the
    /// urban class. This is the only mutation of a run; it never reverts.
    pub fn commit(&mut self, indices: &[usize]) {
        self.current.fill_cells(indices, URBAN_CODE);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    /// 3x3 study area: row 0 urban, row 1 other non-urban, row 2 no-data.
    fn small_state(restricted: Option<Mask>) -> LandCoverState {
        let shape = GridShape::new(3, 3);
        let initial = RasterGrid::from_values(
            shape,
            vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 0.0, 0.0, 0.0],
            Some(0.0),
        )
        .unwrap();
        let future = RasterGrid::from_values(
            shape,
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 0.0, 0.0, 0.0],
            Some(0.0),
        )
        .unwrap();
        let restricted = restricted.unwrap_or_else(|| Mask::filled(shape, false));
        LandCoverState::new(initial, future, restricted).unwrap()
    }

    #[test]
    fn counts_and_deficit_come_from_valid_cells_only() {
        let state = small_state(None);
        assert_eq!(state.initial_urban_count(), 3);
        assert_eq!(state.target_urban_count(), 5);
        assert_eq!(state.initial_deficit(), 2);
        assert_eq!(state.remaining_need(), 2);
    }

    #[test]
    fn candidate_mask_excludes_urban_invalid_and_restricted() {
        let shape = GridShape::new(3, 3);
        // Restrict cell (1, 2).
        let bits_grid = RasterGrid::from_values(
            shape,
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            None,
        )
        .unwrap();
        let restricted = Mask::from_grid(&bits_grid, |v| v > 0.5);

        let state = small_state(Some(restricted));
        let candidates = state.candidate_mask().unwrap();
        // Row 0 is urban, row 2 is no-data, cell 5 is restricted.
        assert_eq!(candidates.iter_ones().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn commit_is_monotone_and_tracked_by_urban_count() {
        let mut state = small_state(None);
        assert_eq!(state.urban_count(), 3);
        state.commit(&[3, 4]);
        assert_eq!(state.urban_count(), 5);
        assert_eq!(state.remaining_need(), 0);
        // The initial grid is untouched; only `current` changed.
        assert!((state.initial().values()[3] - 2.0).abs() < f32::EPSILON);
        assert!((state.current().values()[3] - 1.0).abs() < f32::EPSILON);
        // Committing again does not revert anything.
        state.commit(&[3]);
        assert_eq!(state.urban_count(), 5);
    }

    #[test]
    fn transition_mask_is_future_urban_restricted_to_initially_non_urban() {
        let state = small_state(None);
        let transitions = state.transition_mask().unwrap();
        assert_eq!(transitions.iter_ones().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn extent_disagreement_is_rejected() {
        let initial = RasterGrid::filled(GridShape::new(2, 2), 1.0);
        let future = RasterGrid::filled(GridShape::new(2, 3), 1.0);
        let restricted = Mask::filled(GridShape::new(2, 2), false);
        assert!(matches!(
            LandCoverState::new(initial, future, restricted),
            Err(RasterError::DimensionMismatch { .. })
        ));
    }
}
