//! # lunar-cutout
//!
//! Extract elevation cutouts around named lunar features.
//!
//! A [`CutoutPipeline`] ties a [`FeatureCatalog`](lunar_features::FeatureCatalog)
//! to an open [`RasterSource`](lunar_dem::RasterSource): a request names a
//! feature (or gives coordinates) and a size, the pipeline finds the pixel
//! window, reads only that window, and warps it into a projection centered
//! on the feature.
//!
//! ```no_run
//! use lunar_cutout::{CutoutConfig, CutoutPipeline, CutoutRequest, SizeSpec};
//!
//! let mut pipeline = CutoutPipeline::from_config(CutoutConfig::load("cutout.yaml")?)?;
//! let request = CutoutRequest::feature("Tycho").size(SizeSpec::Diameters(2.0));
//! pipeline.cutout_to_file(&request, "tycho.tif")?;
//! # Ok::<(), lunar_cutout::CutoutError>(())
//! ```

pub mod config;
mod error;
mod pipeline;
pub mod request;

pub use config::CutoutConfig;
pub use error::{CutoutError, ErrorKind};
pub use pipeline::{open_source, CutoutPipeline, ResolvedTarget};
pub use request::{CutoutRequest, CutoutTarget, ProjectionChoice, SizeSpec};

/// Result type for cutout operations.
pub type Result<T> = std::result::Result<T, CutoutError>;
