//! Tiled probability assembly.
//!
//! The oracle never sees the whole raster at once: the assembler partitions
//! the extent into a row-major grid of fixed-size tiles, gathers each
//! tile's factor sub-window into a [`FeatureBatch`], invokes the oracle
//! once per tile, and stitches the per-tile surfaces into one full-extent
//! probability grid. This bounds oracle memory and throughput on large
//! study areas.
//!
//! The last tile of each row and column is clipped to the remaining extent,
//! never padded: the oracle's internal neighborhood logic is
//! shape-sensitive, so the dimensions it receives are the actual clipped
//! ones. Tiles carry no state across one assembly call and have no data
//! dependency on each other, so they are predicted in parallel; collecting
//! the parallel iterator is the synchronization barrier before any caller
//! reads the stitched surface.
//!
//! The assembled surface is a snapshot of the factor stack alone -- the
//! oracle observes driver factors, never the current urban mask.

use rayon::prelude::*;
use sprawl_raster::{NormalizedFactorStack, RasterError, RasterGrid};
use sprawl_types::{GridShape, TileRect};

use crate::oracle::{FeatureBatch, OracleError, UrbanizationOracle};

/// Errors that can occur during probability assembly.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// The oracle invocation for a tile failed.
    #[error("oracle invocation failed for tile {tile}: {source}")]
    Oracle {
        /// The tile whose prediction failed.
        tile: TileRect,
        /// The underlying oracle error.
        source: OracleError,
    },

    /// The oracle returned a surface of the wrong size for a tile.
    #[error("oracle returned {found} values for tile {tile} ({expected} cells)")]
    SurfaceShape {
        /// The offending tile.
        tile: TileRect,
        /// Expected cell count.
        expected: usize,
        /// Number of values actually returned.
        found: usize,
    },

    /// A raster operation failed while stitching.
    #[error("raster error during assembly: {source}")]
    Raster {
        /// The underlying raster error.
        #[from]
        source: RasterError,
    },
}

/// Partitions the study area into tiles and assembles oracle output.
#[derive(Debug, Clone, Copy)]
pub struct TiledProbabilityAssembler {
    /// Nominal tile side length in cells; final tiles are clipped.
    tile_size: usize,
}

impl TiledProbabilityAssembler {
    /// Create an assembler with the given nominal tile size.
    ///
    /// A size of zero is treated as one to keep the partition well-formed;
    /// configuration validation rejects zero before it gets here.
    pub const fn new(tile_size: usize) -> Self {
        Self {
            tile_size: if tile_size == 0 { 1 } else { tile_size },
        }
    }

    /// The nominal tile side length.
    pub const fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// Partition an extent into row-major tiles with clipped remainders.
    ///
    /// Every cell belongs to exactly one tile: offsets advance by the
    /// nominal size and each tile's dimensions shrink to whatever extent
    /// remains.
    pub fn tiles(&self, shape: GridShape) -> Vec<TileRect> {
        let mut tiles = Vec::new();
        for row_offset in (0..shape.rows).step_by(self.tile_size) {
            let height = self.tile_size.min(shape.rows.saturating_sub(row_offset));
            for col_offset in (0..shape.cols).step_by(self.tile_size) {
                let width = self.tile_size.min(shape.cols.saturating_sub(col_offset));
                tiles.push(TileRect::new(row_offset, col_offset, height, width));
            }
        }
        tiles
    }

    /// Assemble the full-extent probability surface.
    ///
    /// Tiles are predicted concurrently; the collected result vector is the
    /// barrier that guarantees every tile is finished before stitching.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Oracle`] if any tile's prediction fails and
    /// [`AssemblyError::SurfaceShape`] if a tile surface has the wrong cell
    /// count.
    pub fn assemble(
        &self,
        stack: &NormalizedFactorStack,
        oracle: &dyn UrbanizationOracle,
    ) -> Result<RasterGrid, AssemblyError> {
        let shape = stack.shape();
        let tiles = self.tiles(shape);

        let predicted: Vec<(TileRect, Vec<f32>)> = tiles
            .par_iter()
            .map(|&tile| {
                let batch = gather_features(stack, tile);
                let surface = oracle
                    .predict(&batch)
                    .map_err(|source| AssemblyError::Oracle { tile, source })?;
                if surface.len() != tile.cell_count() {
                    return Err(AssemblyError::SurfaceShape {
                        tile,
                        expected: tile.cell_count(),
                        found: surface.len(),
                    });
                }
                Ok((tile, surface))
            })
            .collect::<Result<_, AssemblyError>>()?;

        let mut values = vec![0.0_f32; shape.cell_count()];
        for (tile, surface) in predicted {
            for (tile_row, row_values) in surface.chunks(tile.width.max(1)).enumerate() {
                let row = tile.row_offset.saturating_add(tile_row);
                for (tile_col, &probability) in row_values.iter().enumerate() {
                    let col = tile.col_offset.saturating_add(tile_col);
                    if let Some(idx) = shape.index_of(row, col)
                        && let Some(cell) = values.get_mut(idx)
                    {
                        *cell = probability;
                    }
                }
            }
        }
        Ok(RasterGrid::from_values(shape, values, None)?)
    }
}

/// Gather one tile's feature batch: per cell in row-major order, every
/// factor value in ascending factor-id order.
fn gather_features(stack: &NormalizedFactorStack, tile: TileRect) -> FeatureBatch {
    let factor_count = stack.factor_count();
    let mut features = Vec::with_capacity(tile.cell_count().saturating_mul(factor_count));
    for tile_row in 0..tile.height {
        let row = tile.row_offset.saturating_add(tile_row);
        for tile_col in 0..tile.width {
            let col = tile.col_offset.saturating_add(tile_col);
            for (_, layer) in stack.layers() {
                features.push(layer.value_at(row, col).unwrap_or(0.0));
            }
        }
    }
    FeatureBatch {
        features,
        factor_count,
        tile,
    }
}
