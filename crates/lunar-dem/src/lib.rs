//! # lunar-dem
//!
//! Reading, windowing and reprojecting lunar digital elevation models.
//!
//! The crate is built around the LRO LOLA global mosaic, a 92160 x 46080
//! int16 GeoTIFF in simple cylindrical projection on a 1737.4 km sphere
//! (about 8 GB). Nothing here ever loads the whole raster:
//!
//! - [`window`] turns a center and size in degrees into pixel windows, splitting
//!   boxes that cross the antimeridian and truncating them at the poles.
//! - [`RasterSource`] decodes only the TIFF strips or tiles a window touches.
//! - [`Reprojector`] warps a cutout into a local azimuthal projection so
//!   craters far from the equator stay round.
//! - [`GeoTiffWriter`] and [`OutputFormat`] write results back out.
//!
//! ## Example
//!
//! ```no_run
//! use lunar_dem::{warp, window, RasterSource, TargetProjection, LocalProjection};
//!
//! let mut source = RasterSource::open("Lunar_LRO_LOLA_Global_LDEM_118m_Mar2014.tif")?
//!     .with_value_scale(0.5);
//!
//! // Tycho, 5 degrees on a side
//! let region = window::bounding_box(-11.36, -43.31, 5.0)?;
//! let grid = source.read_region(&region)?;
//!
//! let local = warp(&grid, TargetProjection::Local(LocalProjection::Orthographic))?;
//! local.write_geotiff("tycho.tif")?;
//! # Ok::<(), lunar_dem::DemError>(())
//! ```

mod affine;
mod error;
pub mod geokeys;
mod grid;
pub mod projection;
mod reproject;
mod source;
pub mod testdata;
pub mod window;
mod writer;

pub use affine::AffineTransform;
pub use error::{DemError, DemErrorKind};
pub use grid::{ElevationGrid, GridStats, DEFAULT_NODATA};
pub use projection::{LocalProjection, Projection, MOON_RADIUS_M};
pub use reproject::{centroid, warp, Reprojector, Resampling, TargetProjection, DEFAULT_MAX_PIXELS};
pub use source::{RasterMetadata, RasterSource, LOLA_URL};
pub use window::{GeoBoundingBox, GeoRegion, GeoWindow, RasterWindow};
pub use writer::{ascii_grid, GeoTiffCompression, GeoTiffWriter, OutputFormat};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;
