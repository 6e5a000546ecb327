//! End-to-end growth allocation scenarios against the public API.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::atomic::{AtomicUsize, Ordering};

use sprawl_core::{
    AllocationConfig, ConstantOracle, FeatureBatch, GrowthEndReason, LandCoverState,
    NoOpCallback, OracleError, RunControl, StepCallback, StepSummary, TiledProbabilityAssembler,
    UrbanizationOracle, run_growth,
};
use sprawl_raster::{Mask, NormalizedFactorStack, RasterGrid, RawFactor};
use sprawl_types::{FactorId, GridShape, is_urban};

/// Echo the first feature of every cell as its likelihood.
struct FirstFeatureOracle;

impl UrbanizationOracle for FirstFeatureOracle {
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<f32>, OracleError> {
        Ok(batch
            .features
            .chunks(batch.factor_count.max(1))
            .map(|cell| cell.first().copied().unwrap_or(0.0))
            .collect())
    }
}

/// A seeded stochastic-looking oracle: likelihoods are a hash of the cell's
/// feature bits and the seed. Identical inputs and seed always reproduce
/// identical output, which documents the engine's determinism boundary --
/// the engine is exactly as deterministic as its oracle.
struct JitterOracle {
    seed: u64,
}

impl JitterOracle {
    const fn xorshift64(mut x: u64) -> u64 {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        x
    }
}

impl UrbanizationOracle for JitterOracle {
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<f32>, OracleError> {
        Ok(batch
            .features
            .chunks(batch.factor_count.max(1))
            .map(|cell| {
                let mut hash = self.seed.max(1);
                for &feature in cell {
                    hash = Self::xorshift64(hash ^ u64::from(feature.to_bits()));
                }
                #[allow(clippy::cast_precision_loss)]
                let unit = (hash % 1_000_000) as f32 / 1_000_000.0;
                unit
            })
            .collect())
    }
}

/// Succeeds for the first `fail_after` calls, then fails.
struct FlakyOracle {
    calls: AtomicUsize,
    fail_after: usize,
}

impl UrbanizationOracle for FlakyOracle {
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<f32>, OracleError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_after {
            return Err(OracleError::Backend {
                message: String::from("backend went away"),
            });
        }
        Ok(vec![0.5; batch.cell_count()])
    }
}

/// Build the 8x8 reference scenario: 10 urban cells at the start, 14 in the
/// observed future, everything valid, two driver factors.
fn reference_scenario() -> (LandCoverState, NormalizedFactorStack) {
    let shape = GridShape::new(8, 8);
    let mut initial = vec![2.0; shape.cell_count()];
    let mut future = vec![2.0; shape.cell_count()];
    for cell in initial.iter_mut().take(10) {
        *cell = 1.0;
    }
    for cell in future.iter_mut().take(14) {
        *cell = 1.0;
    }
    let initial = RasterGrid::from_values(shape, initial, Some(0.0)).unwrap();
    let future = RasterGrid::from_values(shape, future, Some(0.0)).unwrap();
    let state = LandCoverState::new(initial, future, Mask::filled(shape, false)).unwrap();

    #[allow(clippy::cast_precision_loss)]
    let ramp: Vec<f32> = (0..shape.cell_count()).map(|i| i as f32).collect();
    let reverse: Vec<f32> = ramp.iter().rev().copied().collect();
    let stack = NormalizedFactorStack::from_raw(vec![
        RawFactor {
            id: FactorId::new(1),
            grid: RasterGrid::from_values(shape, ramp, None).unwrap(),
            log_transform: false,
        },
        RawFactor {
            id: FactorId::new(2),
            grid: RasterGrid::from_values(shape, reverse, None).unwrap(),
            log_transform: false,
        },
    ])
    .unwrap();
    (state, stack)
}

fn two_iteration_config() -> AllocationConfig {
    AllocationConfig {
        iterations: 2,
        ..AllocationConfig::default()
    }
}

#[test]
fn reference_scenario_converts_its_even_quota_each_iteration() {
    let (mut state, stack) = reference_scenario();
    let summary = run_growth(
        &mut state,
        &stack,
        &FirstFeatureOracle,
        &two_iteration_config(),
        &RunControl::new(),
        &mut NoOpCallback,
    )
    .unwrap();

    // Deficit 4 over 2 iterations: quota floor(4/2) = 2.
    assert_eq!(summary.quota, 2);
    assert_eq!(summary.end_reason, GrowthEndReason::IterationsComplete);
    assert_eq!(summary.steps.len(), 2);
    // The ramp oracle ranks candidates strictly, so no ties expand a round.
    assert_eq!(summary.steps[0].converted, 2);
    assert_eq!(summary.steps[1].converted, 2);
    assert_eq!(summary.final_urban_count, 14);
    assert_eq!(state.urban_count(), 14);
}

#[test]
fn growth_is_monotone_across_the_whole_run() {
    let (mut state, stack) = reference_scenario();
    let urban_before: Vec<usize> = state.urban_mask().iter_ones().collect();

    run_growth(
        &mut state,
        &stack,
        &FirstFeatureOracle,
        &two_iteration_config(),
        &RunControl::new(),
        &mut NoOpCallback,
    )
    .unwrap();

    // Every cell urban at the start is still urban at the end.
    let current = state.current().values();
    for idx in urban_before {
        assert!(is_urban(current[idx]));
    }
    // And the initial grid itself was never touched.
    for (value, was) in state.initial().values().iter().zip(
        reference_scenario().0.initial().values().iter(),
    ) {
        assert!((value - was).abs() < f32::EPSILON);
    }
}

#[test]
fn every_step_meets_its_quota_even_through_ties() {
    let (mut state, stack) = reference_scenario();
    let summary = run_growth(
        &mut state,
        &stack,
        // Constant likelihoods: maximal ties.
        &ConstantOracle::new(0.7),
        &AllocationConfig {
            iterations: 4,
            ..AllocationConfig::default()
        },
        &RunControl::new(),
        &mut NoOpCallback,
    )
    .unwrap();

    for step in &summary.steps {
        assert!(step.converted >= step.quota.min(step.candidates));
    }
    // The quota is never recomputed from the shrinking remainder, so with
    // candidates to spare the run always reaches (or, through ties,
    // overshoots) the target.
    assert!(summary.final_urban_count >= summary.target_urban_count);
}

#[test]
fn pressure_decays_by_half_each_iteration() {
    let (mut state, stack) = reference_scenario();
    let summary = run_growth(
        &mut state,
        &stack,
        &FirstFeatureOracle,
        &two_iteration_config(),
        &RunControl::new(),
        &mut NoOpCallback,
    )
    .unwrap();

    assert!((summary.steps[0].pressure - 1.0).abs() < f32::EPSILON);
    assert!((summary.steps[1].pressure - 0.5).abs() < f32::EPSILON);
}

#[test]
fn cancellation_from_a_callback_stops_before_the_next_iteration() {
    struct CancelAfterFirst<'a> {
        control: &'a RunControl,
    }
    impl StepCallback for CancelAfterFirst<'_> {
        fn on_step(&mut self, _summary: &StepSummary, _state: &LandCoverState) {
            self.control.cancel();
        }
    }

    let (mut state, stack) = reference_scenario();
    let control = RunControl::new();
    let mut callback = CancelAfterFirst { control: &control };
    let summary = run_growth(
        &mut state,
        &stack,
        &FirstFeatureOracle,
        &AllocationConfig {
            iterations: 10,
            ..AllocationConfig::default()
        },
        &control,
        &mut callback,
    )
    .unwrap();

    assert_eq!(summary.end_reason, GrowthEndReason::Cancelled);
    // Exactly one iteration committed; the abort landed between iterations
    // on a consistent state.
    assert_eq!(summary.steps.len(), 1);
    assert_eq!(state.urban_count(), summary.steps[0].urban_count);
}

#[test]
fn oracle_failure_preserves_previously_committed_iterations() {
    let (mut state, stack) = reference_scenario();
    // One tile per assembly at this extent, so the second iteration's
    // invocation is the second call.
    let oracle = FlakyOracle {
        calls: AtomicUsize::new(0),
        fail_after: 1,
    };

    let err = run_growth(
        &mut state,
        &stack,
        &oracle,
        &two_iteration_config(),
        &RunControl::new(),
        &mut NoOpCallback,
    )
    .unwrap_err();

    // The error surfaced, and iteration 1's conversions are still there
    // for inspection: at least the quota of 2 cells committed before the
    // backend died.
    let _ = err;
    assert!(state.urban_count() >= 12);
    assert!(state.urban_count() < 64);
}

#[test]
fn seeded_jitter_oracle_reproduces_itself_exactly() {
    let (_, stack) = reference_scenario();
    let assembler = TiledProbabilityAssembler::new(64);

    let a = assembler
        .assemble(&stack, &JitterOracle { seed: 42 })
        .unwrap();
    let b = assembler
        .assemble(&stack, &JitterOracle { seed: 42 })
        .unwrap();
    assert_eq!(a, b);

    let c = assembler
        .assemble(&stack, &JitterOracle { seed: 43 })
        .unwrap();
    assert_ne!(a, c);
}
