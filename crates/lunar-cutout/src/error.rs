//! Error types for the cutout pipeline.

use lunar_dem::{DemError, DemErrorKind};
use lunar_features::{FeatureError, FeatureErrorKind};
use thiserror::Error;

/// What went wrong, independent of which stage raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown feature name.
    NotFound,
    /// The feature table is missing or malformed.
    CatalogLoad,
    /// The requested region cannot be cut out.
    UnsupportedRegion,
    /// The requested region lies outside the raster.
    OutOfBounds,
    /// Storage failure.
    Io,
    /// Invalid projection or transform.
    Projection,
    /// Invalid configuration.
    Config,
}

impl ErrorKind {
    /// Process exit code for the command line runner.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::NotFound | ErrorKind::UnsupportedRegion | ErrorKind::OutOfBounds => 2,
            ErrorKind::Config | ErrorKind::CatalogLoad => 3,
            ErrorKind::Io | ErrorKind::Projection => 1,
        }
    }
}

/// Errors from any stage of a cutout.
#[derive(Debug, Error)]
pub enum CutoutError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Dem(#[from] DemError),

    /// Output could not be serialized.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CutoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CutoutError::Feature(e) => match e.kind() {
                FeatureErrorKind::NotFound => ErrorKind::NotFound,
                FeatureErrorKind::CatalogLoad => ErrorKind::CatalogLoad,
            },
            CutoutError::Dem(e) => match e.kind() {
                DemErrorKind::UnsupportedRegion => ErrorKind::UnsupportedRegion,
                DemErrorKind::OutOfBounds => ErrorKind::OutOfBounds,
                DemErrorKind::Io => ErrorKind::Io,
                DemErrorKind::Projection => ErrorKind::Projection,
            },
            CutoutError::Encode(_) => ErrorKind::Io,
            CutoutError::Config(_) => ErrorKind::Config,
        }
    }
}
