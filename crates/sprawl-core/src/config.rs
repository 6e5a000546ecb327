//! Configuration loading and typed config structures for the simulation.
//!
//! The canonical configuration lives in `sprawl-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads, applies environment
//! overrides, and validates the file.
//!
//! Allocation and oracle sections carry defaults matching the design
//! values; input, factor, and output sections are required, since there is
//! no sensible default for the caller's file layout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but violates a semantic constraint.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Description of the violated constraint.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `sprawl-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Observed land-cover input grids.
    pub inputs: InputConfig,

    /// Driver-factor layers and the restricted-factor designation.
    pub factors: FactorsConfig,

    /// Growth allocation parameters.
    #[serde(default)]
    pub allocation: AllocationConfig,

    /// Built-in logistic oracle parameters.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Output artifact paths.
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for output paths:
    /// - `SPRAWL_OUTPUT_RASTER` overrides `output.raster`
    /// - `SPRAWL_OUTPUT_SUMMARY` overrides `output.summary`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a semantic constraint is violated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] on a parse failure or
    /// [`ConfigError::Invalid`] on a constraint violation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.output.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints the type system cannot express.
    fn validate(&self) -> Result<(), ConfigError> {
        self.allocation.validate()?;

        if self.factors.layers.is_empty() {
            return Err(ConfigError::Invalid {
                message: String::from("factors.layers must name at least one layer"),
            });
        }
        let mut seen = BTreeMap::new();
        for layer in &self.factors.layers {
            if seen.insert(layer.id, ()).is_some() {
                return Err(ConfigError::Invalid {
                    message: format!("factors.layers repeats id {}", layer.id),
                });
            }
        }
        if !seen.contains_key(&self.factors.restricted_id) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "factors.restricted_id {} names no configured layer",
                    self.factors.restricted_id
                ),
            });
        }
        Ok(())
    }
}

/// Observed land-cover input grids.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputConfig {
    /// Path of the observed starting land-cover raster.
    pub initial: PathBuf,

    /// Path of the observed future land-cover raster.
    pub observed_future: PathBuf,

    /// No-data sentinel for the land-cover grids.
    #[serde(default = "default_land_cover_nodata")]
    pub nodata: f32,
}

/// Driver-factor configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FactorsConfig {
    /// Identifier of the layer interpreted as the hard no-build zone mask.
    /// An explicit field: nothing in the engine hardcodes which factor is
    /// restricted.
    pub restricted_id: u16,

    /// The driver layers, one entry per factor.
    pub layers: Vec<FactorLayerConfig>,
}

/// One driver-factor layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FactorLayerConfig {
    /// The factor identifier; ascending order is the canonical feature
    /// order, so assignments must stay stable across runs of one model.
    pub id: u16,

    /// Path of the layer's raster file.
    pub path: PathBuf,

    /// Whether to apply `ln(1 + value)` before normalization. In this
    /// domain exactly the central-business-district distance layer wants
    /// it.
    #[serde(default)]
    pub log_transform: bool,

    /// No-data sentinel for this layer.
    #[serde(default = "default_factor_nodata")]
    pub nodata: f32,
}

/// Growth allocation parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllocationConfig {
    /// Number of allocation iterations.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Nominal tile side length for probability assembly.
    #[serde(default = "default_tile_size")]
    pub tile_size: usize,

    /// Weight of the neighborhood influence surface in the combination.
    #[serde(default = "default_neighborhood_weight")]
    pub neighborhood_weight: f32,

    /// Multiplier applied to the pressure scalar after every iteration.
    #[serde(default = "default_pressure_decay")]
    pub pressure_decay: f32,
}

impl AllocationConfig {
    /// Check allocation constraints.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::Invalid {
                message: String::from("allocation.iterations must be at least 1"),
            });
        }
        if self.tile_size == 0 {
            return Err(ConfigError::Invalid {
                message: String::from("allocation.tile_size must be at least 1"),
            });
        }
        if !(self.pressure_decay > 0.0 && self.pressure_decay <= 1.0) {
            return Err(ConfigError::Invalid {
                message: String::from("allocation.pressure_decay must be in (0, 1]"),
            });
        }
        if !(self.neighborhood_weight >= 0.0 && self.neighborhood_weight.is_finite()) {
            return Err(ConfigError::Invalid {
                message: String::from("allocation.neighborhood_weight must be finite and >= 0"),
            });
        }
        Ok(())
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            tile_size: default_tile_size(),
            neighborhood_weight: default_neighborhood_weight(),
            pressure_decay: default_pressure_decay(),
        }
    }
}

/// Built-in logistic oracle parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OracleConfig {
    /// Intercept of the logistic combination.
    #[serde(default)]
    pub bias: f32,

    /// Per-factor weights, keyed by factor id. Missing factors weigh zero.
    #[serde(default)]
    pub weights: BTreeMap<u16, f32>,
}

/// Output artifact paths.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputConfig {
    /// Path the final working-state raster is written to.
    pub raster: PathBuf,

    /// Path the JSON run summary is written to.
    pub summary: PathBuf,
}

impl OutputConfig {
    /// Apply environment-variable overrides for output paths.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SPRAWL_OUTPUT_RASTER") {
            self.raster = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("SPRAWL_OUTPUT_SUMMARY") {
            self.summary = PathBuf::from(path);
        }
    }
}

fn default_land_cover_nodata() -> f32 {
    0.0
}

fn default_factor_nodata() -> f32 {
    -9999.0
}

const fn default_iterations() -> u32 {
    10
}

const fn default_tile_size() -> usize {
    64
}

fn default_neighborhood_weight() -> f32 {
    0.9
}

fn default_pressure_decay() -> f32 {
    0.5
}
