//! Synthetic global rasters for tests and benchmarks.
//!
//! The rasters are generated in memory and written through
//! [`crate::GeoTiffWriter`] with small strips, so windowed reads cross
//! chunk boundaries without any binary fixtures in the repository.

use crate::projection::MOON_RADIUS_M;
use crate::{AffineTransform, ElevationGrid, GeoTiffWriter, Projection, Result};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

/// Nodata value of synthetic rasters.
pub const NODATA: f32 = -32768.0;

/// Rows per strip of written rasters.
pub const ROWS_PER_STRIP: u32 = 16;

/// A global raster whose sample at (col, row) is `1000 * row + col`.
///
/// The southernmost row is nodata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticRaster {
    pub width: u32,
    pub height: u32,
    pub projection: Projection,
    pub transform: AffineTransform,
}

impl SyntheticRaster {
    /// Longitude/latitude grid covering the whole body.
    pub fn geographic(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            projection: Projection::Geographic { radius: MOON_RADIUS_M },
            transform: AffineTransform::from_origin(
                -180.0,
                90.0,
                360.0 / f64::from(width),
                180.0 / f64::from(height),
            ),
        }
    }

    /// Equirectangular grid laid out like the LOLA global mosaic.
    pub fn lunar_eqc(width: u32, height: u32) -> Self {
        let half_circumference = PI * MOON_RADIUS_M;
        Self {
            width,
            height,
            projection: Projection::lunar_equirectangular(),
            transform: AffineTransform::from_origin(
                -half_circumference,
                half_circumference / 2.0,
                2.0 * half_circumference / f64::from(width),
                half_circumference / f64::from(height),
            ),
        }
    }

    /// Sample value at a pixel.
    pub fn value_at(&self, col: u32, row: u32) -> f32 {
        if row + 1 == self.height {
            NODATA
        } else {
            (row * 1000 + col) as f32
        }
    }

    /// The raster as an in-memory grid.
    pub fn grid(&self) -> Result<ElevationGrid> {
        let data = (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| (col, row)))
            .map(|(col, row)| self.value_at(col, row))
            .collect();
        ElevationGrid::new(
            data,
            self.width,
            self.height,
            self.transform,
            self.projection,
            Some(NODATA),
        )
    }

    fn file_name(&self) -> String {
        let kind = if self.projection.is_geographic() { "geographic" } else { "eqc" };
        format!("synthetic_{kind}_{}x{}.tif", self.width, self.height)
    }
}

/// Write `raster` as a GeoTIFF inside `dir`, returning its path.
pub fn write_raster(dir: &Path, raster: &SyntheticRaster) -> Result<PathBuf> {
    let path = dir.join(raster.file_name());
    GeoTiffWriter::new(&raster.grid()?)
        .rows_per_strip(ROWS_PER_STRIP)
        .write(&path)?;
    Ok(path)
}
