//! Error types for the DEM crate.

use thiserror::Error;

/// Coarse classification of a [`DemError`].
///
/// Callers (the CLI, an HTTP front end) map these to exit codes or status
/// codes without matching on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemErrorKind {
    /// The requested region cannot be expressed (bad size, unusable split).
    UnsupportedRegion,
    /// The requested region lies entirely outside the raster.
    OutOfBounds,
    /// Storage-layer failure: missing or corrupt file, bad window at read time.
    Io,
    /// Invalid projection parameters or a non-invertible transform.
    Projection,
}

/// Errors that can occur when working with DEM data.
#[derive(Debug, Error)]
pub enum DemError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The raster file does not exist.
    #[error("Raster not found at {path}; download it from {url} first")]
    RasterMissing {
        /// Path that was tried.
        path: String,
        /// Where the dataset can be fetched from.
        url: &'static str,
    },

    /// TIFF decode or encode error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing or inconsistent georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Unsupported data layout in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// Window does not fit the raster at read time.
    #[error("Window {col_off},{row_off} {width}x{height} does not fit raster {raster_width}x{raster_height}")]
    WindowOutOfRange {
        /// Window column offset.
        col_off: u32,
        /// Window row offset.
        row_off: u32,
        /// Window width.
        width: u32,
        /// Window height.
        height: u32,
        /// Raster width.
        raster_width: u32,
        /// Raster height.
        raster_height: u32,
    },

    /// The requested region lies entirely outside the raster.
    #[error("Region lon {lon_min:.4}..{lon_max:.4}, lat {lat_min:.4}..{lat_max:.4} is outside the raster")]
    OutOfBounds {
        /// West edge in degrees.
        lon_min: f64,
        /// East edge in degrees.
        lon_max: f64,
        /// South edge in degrees.
        lat_min: f64,
        /// North edge in degrees.
        lat_max: f64,
    },

    /// The requested region cannot be handled.
    #[error("Unsupported region: {0}")]
    UnsupportedRegion(String),

    /// Invalid projection parameters or transform.
    #[error("Projection error: {0}")]
    Projection(String),

    /// Grid contents are inconsistent (e.g. data length vs. dimensions).
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),
}

impl DemError {
    /// Classify this error.
    pub fn kind(&self) -> DemErrorKind {
        match self {
            DemError::OutOfBounds { .. } => DemErrorKind::OutOfBounds,
            DemError::UnsupportedRegion(_) => DemErrorKind::UnsupportedRegion,
            DemError::Projection(_) => DemErrorKind::Projection,
            DemError::Io(_)
            | DemError::RasterMissing { .. }
            | DemError::Tiff(_)
            | DemError::InvalidGeoTiff(_)
            | DemError::UnsupportedDataType(_)
            | DemError::WindowOutOfRange { .. }
            | DemError::InvalidGrid(_) => DemErrorKind::Io,
        }
    }
}
