//! Simulation engine binary for the Sprawl land-use model.
//!
//! This is the thin command surface over the allocation engine: it loads
//! configuration, reads the observed land-cover grids and driver-factor
//! rasters, runs the growth simulation with the built-in logistic oracle,
//! and persists the final state plus a JSON run summary.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `sprawl-config.yaml` (or the first argument)
//! 3. Read the initial and observed-future land-cover rasters
//! 4. Read and normalize the driver-factor stack
//! 5. Derive the restricted mask and build the land-cover state
//! 6. Build the logistic oracle from configured weights
//! 7. Run the growth allocation loop
//! 8. Write the final raster, log agreement statistics, write the summary

mod error;
mod logistic;

use std::path::Path;

use sprawl_core::config::SimulationConfig;
use sprawl_core::{
    LandCoverState, RunControl, RunSummary, StepCallback, StepSummary, evaluate, run_growth,
};
use sprawl_io::{read_ascii_grid, write_ascii_grid};
use sprawl_raster::{NormalizedFactorStack, RawFactor};
use sprawl_types::FactorId;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::logistic::LogisticOracle;

/// A step callback that logs each committed iteration.
struct LoggingCallback;

impl StepCallback for LoggingCallback {
    fn on_step(&mut self, summary: &StepSummary, _state: &LandCoverState) {
        info!(
            iteration = summary.iteration,
            candidates = summary.candidates,
            converted = summary.converted,
            urban_count = summary.urban_count,
            "iteration committed"
        );
    }
}

/// Application entry point for the simulation engine.
///
/// # Errors
///
/// Returns an error if configuration, input reading, the simulation
/// itself, or output writing fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("sprawl-engine starting");

    // 2. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("sprawl-config.yaml"));
    let config = SimulationConfig::from_file(Path::new(&config_path))?;
    info!(
        config = config_path,
        iterations = config.allocation.iterations,
        tile_size = config.allocation.tile_size,
        factor_count = config.factors.layers.len(),
        "configuration loaded"
    );

    run(&config)?;
    Ok(())
}

/// Wire up the simulation from configuration and run it to completion.
fn run(config: &SimulationConfig) -> Result<(), EngineError> {
    // 3. Read the land-cover grids. The initial grid's spatial reference is
    //    carried through untouched for output writing.
    let (initial, reference) =
        read_ascii_grid(&config.inputs.initial, Some(config.inputs.nodata))?;
    let (observed_future, _) =
        read_ascii_grid(&config.inputs.observed_future, Some(config.inputs.nodata))?;
    info!(extent = %initial.shape(), "land-cover grids read");

    // 4. Read and normalize the driver factors.
    let mut raw_factors = Vec::with_capacity(config.factors.layers.len());
    for layer in &config.factors.layers {
        let (grid, _) = read_ascii_grid(&layer.path, Some(layer.nodata))?;
        raw_factors.push(RawFactor {
            id: FactorId::new(layer.id),
            grid,
            log_transform: layer.log_transform,
        });
    }
    let stack = NormalizedFactorStack::from_raw(raw_factors)?;
    for (id, range) in stack.ranges() {
        info!(factor = %id, min = range.min, max = range.max, "factor statistics");
    }

    // 5. Restricted mask and state.
    let restricted = stack.restricted_mask(FactorId::new(config.factors.restricted_id))?;
    info!(
        restricted_cells = restricted.count_ones(),
        restricted_factor = config.factors.restricted_id,
        "restricted mask derived"
    );
    let mut state = LandCoverState::new(initial, observed_future, restricted)?;
    info!(
        initial_urban = state.initial_urban_count(),
        target_urban = state.target_urban_count(),
        deficit = state.initial_deficit(),
        "land-cover state built"
    );

    // 6. Oracle.
    let oracle = LogisticOracle::from_config(&config.oracle, &stack.factor_ids());

    // 7. Run the growth loop.
    let control = RunControl::new();
    let mut callback = LoggingCallback;
    let summary = run_growth(
        &mut state,
        &stack,
        &oracle,
        &config.allocation,
        &control,
        &mut callback,
    )?;

    // 8. Persist and evaluate.
    write_ascii_grid(state.current(), &config.output.raster, &reference)?;
    info!(path = %config.output.raster.display(), "final raster written");

    let report = evaluate(&state);
    info!(
        precision = report.precision,
        recall = report.recall,
        f1 = report.f1,
        iou = report.iou,
        kappa = report.kappa,
        "agreement with observed future"
    );

    write_summary(&config.output.summary, &summary)?;
    info!(path = %config.output.summary.display(), "run summary written");
    Ok(())
}

/// Serialize the run summary next to the output raster.
fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), EngineError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| EngineError::SummaryWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let encoded = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, encoded).map_err(|source| EngineError::SummaryWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
