//! The bounded growth-allocation loop.
//!
//! [`run_growth`] drives [`run_step`] for a configured number of
//! iterations with support for:
//!
//! - **No-op runs**: a zero deficit at entry returns immediately with the
//!   working state untouched.
//! - **Early termination**: an exhausted candidate pool ends the run
//!   cleanly -- it is a normal end reason, never an error.
//! - **External cancellation**: a shared [`RunControl`] flag is checked
//!   between iterations (never mid-iteration), so an abort always leaves a
//!   consistent committed state.
//! - **Progress callbacks**: a [`StepCallback`] fires after each committed
//!   iteration.
//!
//! The per-iteration quota is computed **once** from the original deficit,
//! `max(deficit / iterations, 1)` (integer floor), and stays constant
//! across iterations. It is deliberately not recomputed from the shrinking
//! remainder: combined with tie-inclusive conversion this can overshoot
//! the target urban count before the final iteration, which is a
//! reproducibility-sensitive property of the original design, preserved
//! exactly.
//!
//! Iterations are strictly sequential -- each iteration's candidate pool
//! and pressure depend on the previous iteration's committed state. On an
//! oracle failure the error propagates while the caller keeps the state
//! with every previously committed iteration, so progress-to-failure
//! remains inspectable.
//!
//! [`run_step`]: crate::step::run_step

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use sprawl_raster::{NormalizedFactorStack, RasterError};
use sprawl_types::RunId;

use crate::config::AllocationConfig;
use crate::influence::NeighborhoodInfluence;
use crate::oracle::UrbanizationOracle;
use crate::state::LandCoverState;
use crate::step::{self, StepContext, StepError, StepOutcome, StepSummary};
use crate::tiler::TiledProbabilityAssembler;

/// Errors that can occur during the growth run.
#[derive(Debug, thiserror::Error)]
pub enum GrowthError {
    /// An iteration failed.
    #[error("step error: {source}")]
    Step {
        /// The underlying step error.
        #[from]
        source: StepError,
    },

    /// The state and the factor stack disagree in extent.
    #[error("raster error: {source}")]
    Raster {
        /// The underlying raster error.
        #[from]
        source: RasterError,
    },
}

/// Reason why the growth run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrowthEndReason {
    /// All requested iterations were executed.
    IterationsComplete,
    /// The candidate pool was exhausted before the iteration budget.
    CandidatesExhausted,
    /// The deficit was already zero at entry; the run was a no-op.
    NothingToAllocate,
    /// An external cancellation was observed between iterations.
    Cancelled,
}

/// Shared cancellation flag for a running simulation.
///
/// Wrapped in an [`std::sync::Arc`] by embedders and shared with whatever
/// task wants to request an abort. The runner checks it between iterations
/// only, so cancellation always lands on a consistent committed state.
#[derive(Debug, Default)]
pub struct RunControl {
    /// Whether a cancellation has been requested.
    cancelled: AtomicBool,
}

impl RunControl {
    /// Create a control with no cancellation requested.
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cancellation. The run stops before its next iteration.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Callback invoked after each committed iteration.
///
/// Implementations can log progress, update dashboards, or snapshot the
/// working state. The callback sees the iteration summary and the state
/// *after* the commit.
pub trait StepCallback: Send {
    /// Called after an iteration commits successfully.
    fn on_step(&mut self, summary: &StepSummary, state: &LandCoverState);
}

/// A no-op step callback for testing and headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl StepCallback for NoOpCallback {
    fn on_step(&mut self, _summary: &StepSummary, _state: &LandCoverState) {}
}

/// Serializable record of one complete growth run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique identifier of this run.
    pub run_id: RunId,
    /// Wall-clock time the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time the run finished.
    pub finished_at: DateTime<Utc>,
    /// Why the run ended.
    pub end_reason: GrowthEndReason,
    /// The iteration budget that was requested.
    pub iterations_requested: u32,
    /// The constant per-iteration quota derived from the original deficit.
    pub quota: usize,
    /// Valid urban cells in the observed starting state.
    pub initial_urban_count: usize,
    /// Valid urban cells in the observed future state.
    pub target_urban_count: usize,
    /// Valid urban cells in the working state when the run ended.
    pub final_urban_count: usize,
    /// Per-iteration statistics, in execution order.
    pub steps: Vec<StepSummary>,
}

/// Run the growth allocation loop until a termination condition is met.
///
/// # Arguments
///
/// * `state` - Mutable land-cover state; the caller keeps it afterwards,
///   including on error, so committed progress is never discarded.
/// * `factors` - The normalized driver stack the oracle consumes.
/// * `oracle` - The external predictive oracle.
/// * `config` - Iteration budget, tile size, combination weights.
/// * `control` - Shared cancellation flag, checked between iterations.
/// * `callback` - Invoked after each committed iteration.
///
/// # Errors
///
/// Returns [`GrowthError::Raster`] if the state and stack extents disagree,
/// or [`GrowthError::Step`] if an iteration fails (oracle invocation
/// included).
pub fn run_growth(
    state: &mut LandCoverState,
    factors: &NormalizedFactorStack,
    oracle: &dyn UrbanizationOracle,
    config: &AllocationConfig,
    control: &RunControl,
    callback: &mut dyn StepCallback,
) -> Result<RunSummary, GrowthError> {
    if state.shape() != factors.shape() {
        return Err(GrowthError::Raster {
            source: RasterError::DimensionMismatch {
                expected: state.shape(),
                found: factors.shape(),
            },
        });
    }

    let run_id = RunId::new();
    let started_at = Utc::now();
    let deficit = state.initial_deficit();
    let iterations = config.iterations.max(1);

    info!(
        %run_id,
        extent = %state.shape(),
        iterations,
        deficit,
        initial_urban = state.initial_urban_count(),
        target_urban = state.target_urban_count(),
        "growth run starting"
    );

    if deficit == 0 {
        info!(%run_id, "target already met at entry, nothing to allocate");
        return Ok(RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            end_reason: GrowthEndReason::NothingToAllocate,
            iterations_requested: iterations,
            quota: 0,
            initial_urban_count: state.initial_urban_count(),
            target_urban_count: state.target_urban_count(),
            final_urban_count: state.urban_count(),
            steps: Vec::new(),
        });
    }

    // The whole deficit is divided evenly up front; the quota never tracks
    // the shrinking remainder.
    let quota = deficit
        .checked_div(usize::try_from(iterations).unwrap_or(1))
        .unwrap_or(deficit)
        .max(1);

    let influence = NeighborhoodInfluence::new();
    let assembler = TiledProbabilityAssembler::new(config.tile_size);
    let ctx = StepContext {
        factors,
        oracle,
        influence: &influence,
        assembler: &assembler,
        neighborhood_weight: config.neighborhood_weight,
    };

    let mut pressure = 1.0_f32;
    let mut steps: Vec<StepSummary> = Vec::new();
    let mut end_reason = GrowthEndReason::IterationsComplete;

    for iteration in 1..=iterations {
        if control.is_cancelled() {
            warn!(%run_id, iteration, "cancellation requested, stopping between iterations");
            end_reason = GrowthEndReason::Cancelled;
            break;
        }

        match step::run_step(state, &ctx, pressure, quota, iteration)? {
            StepOutcome::NoCandidates => {
                info!(%run_id, iteration, "candidate pool exhausted");
                end_reason = GrowthEndReason::CandidatesExhausted;
                break;
            }
            StepOutcome::Converted(summary) => {
                callback.on_step(&summary, state);
                steps.push(summary);
            }
        }

        pressure *= config.pressure_decay;
    }

    let summary = RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        end_reason,
        iterations_requested: iterations,
        quota,
        initial_urban_count: state.initial_urban_count(),
        target_urban_count: state.target_urban_count(),
        final_urban_count: state.urban_count(),
        steps,
    };
    info!(
        %run_id,
        end_reason = ?summary.end_reason,
        iterations_run = summary.steps.len(),
        final_urban = summary.final_urban_count,
        "growth run finished"
    );
    Ok(summary)
}
