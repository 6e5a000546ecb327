//! Land-cover class codes.
//!
//! Land-cover rasters are categorical grids whose cell values are small
//! integer codes stored as `f32`. Code 0 is the no-data sentinel for
//! land-cover layers and code 1 is urban; other codes are opaque non-urban
//! classes the engine never distinguishes.

/// No-data sentinel code for categorical land-cover grids.
pub const NO_DATA_CODE: f32 = 0.0;

/// Class code for urban cells.
pub const URBAN_CODE: f32 = 1.0;

/// Tolerance for comparing categorical codes.
///
/// Codes are integers carried in `f32` cells; values arrive from file
/// parsing or in-process assignment, so anything within this tolerance of a
/// code is that code.
pub const CLASS_TOLERANCE: f32 = 1e-3;

/// Whether `value` encodes the given class `code`.
pub fn is_class(value: f32, code: f32) -> bool {
    (value - code).abs() < CLASS_TOLERANCE
}

/// Whether `value` encodes the urban class.
pub fn is_urban(value: f32) -> bool {
    is_class(value, URBAN_CODE)
}

/// Whether `value` encodes the land-cover no-data sentinel.
pub fn is_no_data(value: f32) -> bool {
    is_class(value, NO_DATA_CODE)
}
