//! ESRI ASCII grid parsing and emission.
//!
//! The ASCII grid format carries a six-line header (`ncols`, `nrows`,
//! `xllcorner`, `yllcorner`, `cellsize`, optional `NODATA_value`) followed
//! by row-major cell values. The header's georeferencing fields become a
//! [`SpatialReference`] that rides along with the grid purely as
//! pass-through data for eventual output writing -- the simulation never
//! reads it.
//!
//! Rows are stored top-down as in the source files; the engine is
//! orientation-agnostic, so no flipping happens on either side.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sprawl_raster::RasterGrid;
use sprawl_types::GridShape;
use tracing::debug;

use crate::error::IoError;

/// Georeferencing metadata carried alongside a grid.
///
/// Opaque to the engine: parsed on read, emitted unchanged on write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialReference {
    /// X coordinate of the lower-left corner.
    pub xllcorner: f64,
    /// Y coordinate of the lower-left corner.
    pub yllcorner: f64,
    /// Cell edge length in map units.
    pub cellsize: f64,
    /// No-data sentinel declared by the file, if any.
    pub nodata: Option<f32>,
}

/// Read an ESRI ASCII grid.
///
/// `nodata_override` takes precedence over the file's `NODATA_value`
/// header when deriving cell validity; the sentinel is a per-call choice
/// because land-cover and continuous layers use different conventions.
///
/// # Errors
///
/// Returns [`IoError::NotFound`] if the file is absent,
/// [`IoError::Unreadable`] on any other read failure, and
/// [`IoError::Malformed`] when the content is not a valid grid.
pub fn read_ascii_grid(
    path: &Path,
    nodata_override: Option<f32>,
) -> Result<(RasterGrid, SpatialReference), IoError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let mut lines = contents.lines().enumerate();

    let cols = parse_header_field(path, &mut lines, "ncols")?;
    let rows = parse_header_field(path, &mut lines, "nrows")?;
    let xllcorner = parse_header_field(path, &mut lines, "xllcorner")?;
    let yllcorner = parse_header_field(path, &mut lines, "yllcorner")?;
    let cellsize = parse_header_field(path, &mut lines, "cellsize")?;

    let cols = to_extent(path, cols)?;
    let rows = to_extent(path, rows)?;
    let shape = GridShape::new(rows, cols);

    // The NODATA_value line is optional; anything else is already data.
    let mut nodata = None;
    let mut values: Vec<f32> = Vec::with_capacity(shape.cell_count());
    for (index, line) in lines {
        let mut tokens = line.split_whitespace().peekable();
        let Some(&first) = tokens.peek() else {
            continue;
        };
        if values.is_empty() && nodata.is_none() && first.eq_ignore_ascii_case("nodata_value") {
            tokens.next();
            let value = tokens.next().ok_or_else(|| IoError::Malformed {
                path: path.to_path_buf(),
                line: index.saturating_add(1),
                message: String::from("NODATA_value without a value"),
            })?;
            nodata = Some(parse_value(path, index, value)?);
            continue;
        }
        for token in tokens {
            values.push(parse_value(path, index, token)?);
        }
    }

    if values.len() != shape.cell_count() {
        return Err(IoError::Malformed {
            path: path.to_path_buf(),
            line: contents.lines().count(),
            message: format!(
                "expected {} cell values for {shape}, found {}",
                shape.cell_count(),
                values.len()
            ),
        });
    }

    let sentinel = nodata_override.or(nodata);
    let grid = RasterGrid::from_values(shape, values, sentinel).map_err(|source| {
        IoError::Raster {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let reference = SpatialReference {
        xllcorner,
        yllcorner,
        cellsize,
        nodata,
    };
    debug!(path = %path.display(), extent = %shape, "raster read");
    Ok((grid, reference))
}

/// Write a grid as an ESRI ASCII raster, creating intermediate directories
/// as needed.
///
/// Invalid cells are emitted as the reference's no-data sentinel when one
/// is declared; without a sentinel their raw values are written.
///
/// # Errors
///
/// Returns [`IoError::WriteFailed`] if a directory or the file itself
/// cannot be created -- emission never fails silently.
pub fn write_ascii_grid(
    grid: &RasterGrid,
    path: &Path,
    reference: &SpatialReference,
) -> Result<(), IoError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| IoError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let shape = grid.shape();
    let mut out = String::new();
    out.push_str(&format!("ncols {}\n", shape.cols));
    out.push_str(&format!("nrows {}\n", shape.rows));
    out.push_str(&format!("xllcorner {}\n", reference.xllcorner));
    out.push_str(&format!("yllcorner {}\n", reference.yllcorner));
    out.push_str(&format!("cellsize {}\n", reference.cellsize));
    if let Some(sentinel) = reference.nodata {
        out.push_str(&format!("NODATA_value {sentinel}\n"));
    }

    for (row_values, row_validity) in grid
        .values()
        .chunks(shape.cols.max(1))
        .zip(grid.validity().chunks(shape.cols.max(1)))
    {
        let mut first = true;
        for (&value, &valid) in row_values.iter().zip(row_validity.iter()) {
            if !first {
                out.push(' ');
            }
            first = false;
            let emitted = match reference.nodata {
                Some(sentinel) if !valid => sentinel,
                _ => value,
            };
            out.push_str(&emitted.to_string());
        }
        out.push('\n');
    }

    std::fs::write(path, out).map_err(|source| IoError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), extent = %shape, "raster written");
    Ok(())
}

/// Parse one `key value` header line, enforcing the expected key.
fn parse_header_field<'a, I>(
    path: &Path,
    lines: &mut I,
    expected: &str,
) -> Result<f64, IoError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let (index, line) = lines.next().ok_or_else(|| IoError::Malformed {
        path: path.to_path_buf(),
        line: 0,
        message: format!("missing header field {expected}"),
    })?;
    let mut tokens = line.split_whitespace();
    let key = tokens.next().unwrap_or_default();
    if !key.eq_ignore_ascii_case(expected) {
        return Err(IoError::Malformed {
            path: path.to_path_buf(),
            line: index.saturating_add(1),
            message: format!("expected header field {expected}, found {key}"),
        });
    }
    let value = tokens.next().ok_or_else(|| IoError::Malformed {
        path: path.to_path_buf(),
        line: index.saturating_add(1),
        message: format!("header field {expected} without a value"),
    })?;
    value.parse::<f64>().map_err(|_| IoError::Malformed {
        path: path.to_path_buf(),
        line: index.saturating_add(1),
        message: format!("header field {expected} is not numeric: {value}"),
    })
}

/// Convert a parsed header number into a cell-count extent.
fn to_extent(path: &Path, value: f64) -> Result<usize, IoError> {
    if value.fract() != 0.0 || value < 1.0 || value > 1e9 {
        return Err(IoError::Malformed {
            path: path.to_path_buf(),
            line: 1,
            message: format!("grid extent must be a positive integer, found {value}"),
        });
    }
    // Range-checked just above.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value as usize)
}

/// Parse one cell value token.
fn parse_value(path: &Path, line_index: usize, token: &str) -> Result<f32, IoError> {
    token.parse::<f32>().map_err(|_| IoError::Malformed {
        path: path.to_path_buf(),
        line: line_index.saturating_add(1),
        message: format!("cell value is not numeric: {token}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn scratch_path(name: &str) -> PathBuf {
        let unique = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "sprawl-io-test-{}-{unique}-{name}",
            std::process::id()
        ))
    }

    fn sample_reference() -> SpatialReference {
        SpatialReference {
            xllcorner: 500_000.0,
            yllcorner: 4_100_000.0,
            cellsize: 30.0,
            nodata: Some(-9999.0),
        }
    }

    #[test]
    fn write_then_read_round_trips_values_and_reference() {
        let shape = GridShape::new(2, 3);
        let grid = RasterGrid::from_values(
            shape,
            vec![1.0, 2.0, -9999.0, 4.0, 5.5, 6.0],
            Some(-9999.0),
        )
        .unwrap();
        let path = scratch_path("round-trip.asc");

        write_ascii_grid(&grid, &path, &sample_reference()).unwrap();
        let (back, reference) = read_ascii_grid(&path, None).unwrap();

        assert_eq!(back.shape(), shape);
        assert_eq!(back.values(), grid.values());
        assert_eq!(back.validity(), grid.validity());
        assert_eq!(reference, sample_reference());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_not_found_not_unreadable() {
        let err = read_ascii_grid(&scratch_path("absent.asc"), None).unwrap_err();
        assert!(matches!(err, IoError::NotFound { .. }));
    }

    #[test]
    fn bad_header_is_malformed_with_its_line() {
        let path = scratch_path("bad-header.asc");
        std::fs::write(&path, "ncols 2\nnrows x\n").unwrap();
        let err = read_ascii_grid(&path, None).unwrap_err();
        assert!(matches!(err, IoError::Malformed { line: 2, .. }));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn short_value_section_is_malformed() {
        let path = scratch_path("short.asc");
        std::fs::write(
            &path,
            "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n",
        )
        .unwrap();
        let err = read_ascii_grid(&path, None).unwrap_err();
        assert!(matches!(err, IoError::Malformed { .. }));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn nodata_header_is_optional_and_override_wins() {
        let path = scratch_path("no-nodata.asc");
        std::fs::write(
            &path,
            "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n7 0\n",
        )
        .unwrap();
        let (grid, reference) = read_ascii_grid(&path, Some(0.0)).unwrap();
        assert_eq!(reference.nodata, None);
        // The override marked the 0 cell invalid.
        assert_eq!(grid.validity(), &[true, false]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn writing_creates_intermediate_directories() {
        let dir = scratch_path("nested-dir");
        let path = dir.join("deeper").join("out.asc");
        let grid = RasterGrid::filled(GridShape::new(1, 2), 1.0);

        write_ascii_grid(&grid, &path, &sample_reference()).unwrap();
        assert!(path.exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
