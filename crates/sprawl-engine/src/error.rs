//! Error type for the engine binary.

use std::path::PathBuf;

/// Errors that can occur while wiring up and running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: sprawl_core::ConfigError,
    },

    /// A raster file could not be read or written.
    #[error("raster file error: {source}")]
    RasterFile {
        /// The underlying file error.
        #[from]
        source: sprawl_io::IoError,
    },

    /// Grid construction or normalization failed.
    #[error("raster error: {source}")]
    Raster {
        /// The underlying raster error.
        #[from]
        source: sprawl_raster::RasterError,
    },

    /// The growth run failed.
    #[error("growth error: {source}")]
    Growth {
        /// The underlying growth error.
        #[from]
        source: sprawl_core::GrowthError,
    },

    /// The run summary could not be serialized.
    #[error("failed to serialize run summary: {source}")]
    SummaryEncode {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The run summary could not be written to disk.
    #[error("failed to write run summary {path}: {source}")]
    SummaryWrite {
        /// The destination path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
