//! The cutout pipeline: catalog lookup, windowing, reading and warping.

use crate::config::CutoutConfig;
use crate::request::{CutoutRequest, CutoutTarget, SizeSpec};
use crate::{CutoutError, Result};
use lunar_dem::window::{bounding_box_with_sides, degrees_from_km, GeoRegion};
use lunar_dem::{DemError, ElevationGrid, RasterSource, Reprojector};
use lunar_features::FeatureCatalog;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Where a request points, after catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTarget {
    /// Catalog name, for feature requests.
    pub name: Option<String>,
    pub lon: f64,
    pub lat: f64,
    pub diameter_km: Option<f64>,
}

/// Runs cutouts against one raster.
///
/// The pipeline owns its raster handle. To serve several workers, build one
/// pipeline per worker with [`CutoutPipeline::worker`]; they share the
/// catalog.
#[derive(Debug)]
pub struct CutoutPipeline {
    catalog: Arc<FeatureCatalog>,
    source: RasterSource,
    config: CutoutConfig,
}

impl CutoutPipeline {
    pub fn new(catalog: Arc<FeatureCatalog>, source: RasterSource, config: CutoutConfig) -> Self {
        Self { catalog, source, config }
    }

    /// Load the catalog and open the raster named in `config`.
    pub fn from_config(config: CutoutConfig) -> Result<Self> {
        config.validate()?;
        let catalog = FeatureCatalog::from_path(&config.features_path)?;
        let source = open_source(&config)?;
        Ok(Self::new(Arc::new(catalog), source, config))
    }

    /// A pipeline sharing this catalog with its own raster handle.
    pub fn worker(&self) -> Result<Self> {
        Ok(Self {
            catalog: Arc::clone(&self.catalog),
            source: self.source.reopen()?,
            config: self.config.clone(),
        })
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    pub fn source(&self) -> &RasterSource {
        &self.source
    }

    pub fn config(&self) -> &CutoutConfig {
        &self.config
    }

    /// Coordinates of the request's target.
    pub fn resolve(&self, target: &CutoutTarget) -> Result<ResolvedTarget> {
        match target {
            CutoutTarget::Feature(name) => {
                let feature = self.catalog.lookup(name)?;
                Ok(ResolvedTarget {
                    name: Some(feature.name.clone()),
                    lon: feature.longitude,
                    lat: feature.latitude,
                    diameter_km: Some(feature.diameter_km),
                })
            }
            CutoutTarget::Coordinates { lon, lat, diameter_km } => Ok(ResolvedTarget {
                name: None,
                lon: *lon,
                lat: *lat,
                diameter_km: *diameter_km,
            }),
        }
    }

    /// Side length in degrees for a request.
    pub fn size_deg(&self, size: Option<SizeSpec>, target: &ResolvedTarget) -> Result<f64> {
        match size {
            None => Ok(self.config.default_size_deg),
            Some(SizeSpec::Degrees(deg)) => Ok(deg),
            Some(SizeSpec::Diameters(multiple)) => match target.diameter_km {
                Some(diameter) if diameter > 0.0 => {
                    let radius = self.source.metadata().projection.radius();
                    Ok(degrees_from_km(multiple * diameter, radius))
                }
                _ => Err(DemError::UnsupportedRegion(format!(
                    "cannot size by diameter: {} has no known diameter",
                    target.name.as_deref().unwrap_or("the target")
                ))
                .into()),
            },
        }
    }

    /// Geographic region a request covers.
    pub fn region(&self, request: &CutoutRequest) -> Result<GeoRegion> {
        let target = self.resolve(&request.target)?;
        self.region_for(request, &target)
    }

    fn region_for(&self, request: &CutoutRequest, target: &ResolvedTarget) -> Result<GeoRegion> {
        let lat_size = self.size_deg(request.size, target)?;
        let lon_size = if self.config.width_correction {
            lat_size / target.lat.to_radians().cos()
        } else {
            lat_size
        };
        Ok(bounding_box_with_sides(target.lon, target.lat, lon_size, lat_size)?)
    }

    /// Cut out the requested region, warped as requested.
    pub fn cutout(&mut self, request: &CutoutRequest) -> Result<ElevationGrid> {
        let start = Instant::now();
        let target = self.resolve(&request.target)?;
        let region = self.region_for(request, &target)?;
        let bbox = region.unwrapped();
        tracing::info!(
            feature = target.name.as_deref().unwrap_or("coordinates"),
            lon = target.lon,
            lat = target.lat,
            lon_min = bbox.lon_min,
            lon_max = bbox.lon_max,
            lat_min = bbox.lat_min,
            lat_max = bbox.lat_max,
            split = region.is_split(),
            "cutting out region"
        );

        let grid = self.source.read_region(&region)?;
        tracing::debug!(dimensions = ?grid.dimensions(), "read window");

        let projection = request.projection.unwrap_or(self.config.projection);
        let grid = match projection.target() {
            Some(target_projection) => Reprojector::new(target_projection)
                .resampling(request.resampling.unwrap_or(self.config.resampling))
                .max_pixels(self.config.max_pixels)
                .warp(&grid)?,
            None => grid,
        };
        let grid = match request.downsample {
            Some(factor) if factor > 1 => grid.downsample_mean(factor)?,
            _ => grid,
        };
        match grid.stats() {
            Some(stats) => tracing::info!(
                dimensions = ?grid.dimensions(),
                projection = %grid.projection(),
                min = stats.min,
                max = stats.max,
                nodata = stats.nodata_count,
                elapsed = ?start.elapsed(),
                "cutout ready"
            ),
            None => tracing::warn!(
                dimensions = ?grid.dimensions(),
                elapsed = ?start.elapsed(),
                "cutout holds only nodata"
            ),
        }
        Ok(grid)
    }

    /// Cut out and write to `path`, returning every file written.
    pub fn cutout_to_file<P: AsRef<Path>>(&mut self, request: &CutoutRequest, path: P) -> Result<Vec<PathBuf>> {
        let grid = self.cutout(request)?;
        let format = request.format.unwrap_or(self.config.output);
        let written = grid.write_output(path.as_ref(), &format)?;
        tracing::info!(files = ?written, "wrote cutout");
        Ok(written)
    }

    /// Cut out and encode in memory, for serving over a network.
    pub fn cutout_to_bytes(&mut self, request: &CutoutRequest) -> Result<Vec<u8>> {
        let grid = self.cutout(request)?;
        let format = request.format.unwrap_or(self.config.output);
        Ok(grid.encode(&format)?)
    }
}

/// Open the configured raster with its projection override and value scale.
pub fn open_source(config: &CutoutConfig) -> Result<RasterSource> {
    let source = match config.source_projection()? {
        Some(projection) => RasterSource::open_with_projection(&config.raster_path, projection),
        None => RasterSource::open(&config.raster_path),
    }
    .map_err(CutoutError::from)?;
    Ok(source.with_value_scale(config.value_scale))
}
