//! Urbanization oracle trait and stub implementation.
//!
//! During probability assembly the engine presents the oracle with one
//! [`FeatureBatch`] per tile and receives back a dense probability surface
//! for that tile. The [`UrbanizationOracle`] trait abstracts the mechanism
//! by which likelihoods are produced -- it could be a learned network
//! behind FFI, a statistical classifier, a lookup table, or a test stub.
//! Any implementation that returns per-tile probability grids satisfies
//! the engine.
//!
//! The engine treats every invocation as a blocking call returning a
//! complete result; there are no partial or streaming surfaces. Values are
//! intended as likelihoods in [0,1] and the engine applies no implicit
//! squashing -- converting raw scores to probabilities is the oracle's
//! responsibility. Implementations should be deterministic across calls
//! with identical inputs; a stochastic oracle is permitted, but the engine
//! then guarantees no more determinism than the oracle itself provides.
//!
//! [`ConstantOracle`] is the in-tree stub, useful for exercising the full
//! allocation loop before a real predictive backend is wired in.

use sprawl_types::TileRect;

/// Errors that can occur during an oracle invocation.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The predictive backend failed.
    #[error("oracle backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// The per-tile input handed to the oracle.
///
/// Features are flattened cell-major: all factor values for the tile's
/// first cell (in ascending factor-id order), then all values for the
/// second cell, and so on in row-major cell order. The tile dimensions are
/// the *actual* clipped height and width -- shape-sensitive oracles must
/// see the true extent, never the nominal tile size.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBatch {
    /// Flattened feature values, `cell_count * factor_count` entries.
    pub features: Vec<f32>,
    /// Number of factors per cell.
    pub factor_count: usize,
    /// The tile this batch describes, with clipped dimensions.
    pub tile: TileRect,
}

impl FeatureBatch {
    /// Number of cells in the batch.
    pub const fn cell_count(&self) -> usize {
        self.tile.cell_count()
    }
}

/// A source of per-cell urbanization likelihoods.
///
/// The engine calls [`predict`] once per tile during probability assembly.
/// Tiles are independent and may be predicted concurrently, so
/// implementations must be shareable across threads.
///
/// [`predict`]: UrbanizationOracle::predict
pub trait UrbanizationOracle: Send + Sync {
    /// Produce one likelihood per cell of the batch's tile.
    ///
    /// The returned vector must hold exactly `batch.cell_count()` values in
    /// row-major cell order.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if the predictive backend fails; the engine
    /// aborts the iteration and preserves state committed by prior
    /// iterations.
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<f32>, OracleError>;
}

/// A stub oracle that assigns every cell the same likelihood.
///
/// Used to exercise the allocation loop without a predictive backend.
/// With a constant surface only neighborhood influence separates
/// candidates, and in a run with no urban seed at all every candidate
/// ties -- a direct probe of the tie-inclusive threshold policy.
#[derive(Debug, Clone, Copy)]
pub struct ConstantOracle {
    /// The likelihood assigned to every cell.
    probability: f32,
}

impl ConstantOracle {
    /// Create a stub oracle returning `probability` everywhere.
    pub const fn new(probability: f32) -> Self {
        Self { probability }
    }
}

impl UrbanizationOracle for ConstantOracle {
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<f32>, OracleError> {
        Ok(vec![self.probability; batch.cell_count()])
    }
}
