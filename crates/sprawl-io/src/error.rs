//! Error types for the `sprawl-io` crate.
//!
//! Ingestion distinguishes a file that is simply absent from one that
//! exists but cannot be understood; callers report the two very
//! differently. Emission never fails silently.

use std::path::PathBuf;

use sprawl_raster::RasterError;

/// Errors that can occur during raster file ingestion and emission.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The raster file does not exist.
    #[error("raster file not found: {path}")]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The raster file exists but could not be read.
    #[error("raster file unreadable: {path}: {source}")]
    Unreadable {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The raster file was read but its content is not a valid grid.
    #[error("malformed raster {path} (line {line}): {message}")]
    Malformed {
        /// The offending path.
        path: PathBuf,
        /// 1-based line where parsing gave up.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// The parsed values do not form a well-shaped grid.
    #[error("raster error in {path}: {source}")]
    Raster {
        /// The offending path.
        path: PathBuf,
        /// The underlying raster error.
        source: RasterError,
    },

    /// The destination could not be created or written.
    #[error("failed to write raster {path}: {source}")]
    WriteFailed {
        /// The destination path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
