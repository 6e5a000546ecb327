//! Shared type definitions for the Sprawl land-use change simulation.
//!
//! This crate holds the small, dependency-light types every other crate
//! agrees on: typed identifiers, grid geometry, and the land-cover class
//! codes used by the categorical rasters.
//!
//! # Modules
//!
//! - [`ids`] -- Typed identifier wrappers ([`FactorId`], [`RunId`]).
//! - [`geometry`] -- Grid extents and tile windows ([`GridShape`],
//!   [`TileRect`]).
//! - [`land`] -- Land-cover class codes and classification helpers.

pub mod geometry;
pub mod ids;
pub mod land;

// Re-export primary types at crate root.
pub use geometry::{GridShape, TileRect};
pub use ids::{FactorId, RunId};
pub use land::{CLASS_TOLERANCE, NO_DATA_CODE, URBAN_CODE, is_class, is_no_data, is_urban};
