//! Raster data model for the Sprawl land-use change simulation.
//!
//! This crate models the gridded study area: typed single-band rasters with
//! per-cell validity, boolean masks with set combinators, a fixed small
//! smoothing kernel, and driver-factor normalization with per-factor range
//! statistics.
//!
//! # Modules
//!
//! - [`error`] -- Error types for raster construction and normalization.
//! - [`grid`] -- [`RasterGrid`], a row-major `f32` grid with a validity
//!   array derived from a caller-supplied no-data sentinel.
//! - [`mask`] -- [`Mask`], a boolean grid with combinators and conversion
//!   to a 0/1 indicator grid.
//! - [`kernel`] -- [`Kernel`], a fixed 5x5 linear smoothing kernel applied
//!   with zero padding and validity masking.
//! - [`factors`] -- [`NormalizedFactorStack`], co-registered driver layers
//!   independently rescaled to [0,1] with recorded min/max statistics.

pub mod error;
pub mod factors;
pub mod grid;
pub mod kernel;
pub mod mask;

// Re-export primary types at crate root.
pub use error::RasterError;
pub use factors::{FactorRange, NormalizedFactorStack, RESTRICTED_THRESHOLD, RawFactor};
pub use grid::RasterGrid;
pub use kernel::Kernel;
pub use mask::Mask;
