//! One growth-allocation iteration.
//!
//! An iteration recomputes the urban mask, estimates neighborhood
//! influence, assembles the oracle's probability surface, combines the
//! three with the decaying pressure scalar, and converts the highest
//! ranked eligible cells:
//!
//! ```text
//! combined = probability * (1 + neighborhood_weight * influence) * pressure
//! ```
//!
//! Candidates are ranked by `combined` descending and the value at rank
//! `min(quota, candidate_count) - 1` becomes the conversion threshold.
//! Every candidate at or above the threshold converts -- ties at the
//! threshold are all included, so an iteration may convert more than its
//! quota. This tie-inclusive policy is deliberate and reproducibility
//! sensitive: inclusion resolves ties deterministically where picking
//! "the first `quota` cells" would depend on arbitrary cell order.

use tracing::debug;

use sprawl_raster::{NormalizedFactorStack, RasterError};
use serde::{Deserialize, Serialize};

use crate::influence::NeighborhoodInfluence;
use crate::oracle::UrbanizationOracle;
use crate::state::LandCoverState;
use crate::tiler::{AssemblyError, TiledProbabilityAssembler};

/// Errors that can occur during one iteration.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Probability assembly failed.
    #[error("assembly error: {source}")]
    Assembly {
        /// The underlying assembly error.
        #[from]
        source: AssemblyError,
    },

    /// A raster operation failed.
    #[error("raster error: {source}")]
    Raster {
        /// The underlying raster error.
        #[from]
        source: RasterError,
    },
}

/// The read-only collaborators one iteration needs.
///
/// Bundled so the runner constructs them once and every iteration borrows
/// the same set.
pub struct StepContext<'a> {
    /// The normalized driver layers the oracle consumes.
    pub factors: &'a NormalizedFactorStack,
    /// The external predictive oracle.
    pub oracle: &'a dyn UrbanizationOracle,
    /// The neighborhood influence estimator.
    pub influence: &'a NeighborhoodInfluence,
    /// The tiled probability assembler.
    pub assembler: &'a TiledProbabilityAssembler,
    /// Fixed positive weight on the influence surface in the combination.
    pub neighborhood_weight: f32,
}

impl core::fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StepContext")
            .field("factors", &self.factors.factor_count())
            .field("neighborhood_weight", &self.neighborhood_weight)
            .finish_non_exhaustive()
    }
}

/// Statistics of one committed iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    /// 1-based iteration number.
    pub iteration: u32,
    /// Number of eligible candidate cells at the start of the iteration.
    pub candidates: usize,
    /// The per-iteration conversion quota in force.
    pub quota: usize,
    /// The combined-score threshold that gated conversion.
    pub threshold: f32,
    /// Number of cells converted (>= quota when candidates suffice; ties
    /// can push it higher).
    pub converted: usize,
    /// Valid urban cells after the commit.
    pub urban_count: usize,
    /// The pressure scalar that was in force during the iteration.
    pub pressure: f32,
}

/// Outcome of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Cells were ranked and converted.
    Converted(StepSummary),
    /// No eligible candidate remained. This is the normal early-termination
    /// condition, not an error.
    NoCandidates,
}

/// Execute one allocation iteration against the working state.
///
/// `pressure` is the current value of the decaying development-pressure
/// scalar; `quota` is the per-iteration conversion target computed once by
/// the runner from the original deficit (not recomputed from the shrinking
/// remainder -- see [`crate::runner`]).
///
/// # Errors
///
/// Returns [`StepError`] if probability assembly or a raster operation
/// fails. The working state is untouched on error: conversion is the last
/// action of an iteration.
pub fn run_step(
    state: &mut LandCoverState,
    ctx: &StepContext<'_>,
    pressure: f32,
    quota: usize,
    iteration: u32,
) -> Result<StepOutcome, StepError> {
    let urban = state.urban_mask();
    let influence_surface = ctx.influence.estimate(&urban, state.valid_mask())?;
    let probability = ctx.assembler.assemble(ctx.factors, ctx.oracle)?;

    let combined: Vec<f32> = probability
        .values()
        .iter()
        .zip(influence_surface.values().iter())
        .map(|(&p, &n)| p * (1.0 + ctx.neighborhood_weight * n) * pressure)
        .collect();

    let candidates = state.candidate_mask()?;
    let indices: Vec<usize> = candidates.iter_ones().collect();
    if indices.is_empty() {
        debug!(iteration, "candidate pool empty, terminating early");
        return Ok(StepOutcome::NoCandidates);
    }

    let scores: Vec<f32> = indices
        .iter()
        .map(|&idx| combined.get(idx).copied().unwrap_or(0.0))
        .collect();

    // Threshold at the quota rank; total_cmp keeps the ordering total even
    // if the oracle emits non-finite values.
    let mut ranked = scores.clone();
    ranked.sort_unstable_by(|a, b| b.total_cmp(a));
    let rank = quota.min(ranked.len()).saturating_sub(1);
    let threshold = ranked.get(rank).copied().unwrap_or(f32::NEG_INFINITY);

    let to_convert: Vec<usize> = indices
        .iter()
        .zip(scores.iter())
        .filter_map(|(&idx, &score)| (score >= threshold).then_some(idx))
        .collect();
    state.commit(&to_convert);

    let summary = StepSummary {
        iteration,
        candidates: indices.len(),
        quota,
        threshold,
        converted: to_convert.len(),
        urban_count: state.urban_count(),
        pressure,
    };
    debug!(
        iteration,
        candidates = summary.candidates,
        quota,
        threshold,
        converted = summary.converted,
        urban_count = summary.urban_count,
        "iteration committed"
    );
    Ok(StepOutcome::Converted(summary))
}
