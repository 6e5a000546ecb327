//! Error types for the `sprawl-raster` crate.
//!
//! All fallible operations in this crate return [`RasterError`] through the
//! standard [`Result`] type alias.

use sprawl_types::{FactorId, GridShape};

/// Errors that can occur during raster construction and normalization.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// Two grids purportedly describing the same study area disagree in
    /// extent. Fatal: co-registration is a construction-time invariant.
    #[error("grid extent mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The extent the study area was established with.
        expected: GridShape,
        /// The extent of the offending grid.
        found: GridShape,
    },

    /// A value buffer does not hold one value per cell of its stated extent.
    #[error("cell buffer length mismatch: expected {expected} values, found {found}")]
    LengthMismatch {
        /// Cell count implied by the extent.
        expected: usize,
        /// Number of values actually supplied.
        found: usize,
    },

    /// Normalization produced an all-undefined layer. Fatal: a degenerate
    /// factor would silently corrupt every feature vector built from it.
    #[error("factor {factor} has no defined cells after normalization")]
    InvalidFactor {
        /// The degenerate factor.
        factor: FactorId,
    },

    /// A duplicate factor identifier was inserted where uniqueness is
    /// required.
    #[error("duplicate factor id: {factor}")]
    DuplicateFactor {
        /// The repeated identifier.
        factor: FactorId,
    },

    /// A factor identifier was requested that is not present in the stack.
    #[error("unknown factor id: {factor}")]
    UnknownFactor {
        /// The missing identifier.
        factor: FactorId,
    },

    /// A factor stack was constructed from zero layers.
    #[error("factor stack must contain at least one layer")]
    EmptyStack,
}
