//! Geographic bounding boxes and their pixel windows.
//!
//! Antimeridian policy: a box that crosses +/-180 degrees longitude is split
//! into a west part (ending at +180) and an east part (starting at -180).
//! Each part gets its own pixel window; readers stitch them west to east.
//!
//! Pole policy: latitudes are clamped to [-90, 90]. A box reaching past a
//! pole is truncated there, never wrapped over to the other side.

use crate::projection::{normalize_lon, Projection};
use crate::{AffineTransform, DemError, Result};
use serde::{Deserialize, Serialize};

/// Snap distance for pixel edges that land within rounding error of an integer.
const PIXEL_SNAP: f64 = 1e-6;

/// A longitude/latitude box in degrees, never crossing the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl GeoBoundingBox {
    /// Create a box from its edges.
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        Self { lon_min, lon_max, lat_min, lat_max }
    }

    /// Longitude extent in degrees.
    pub fn width_deg(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    /// Latitude extent in degrees.
    pub fn height_deg(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Check if a coordinate is within the box (edges included).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.lon_min && lon <= self.lon_max && lat >= self.lat_min && lat <= self.lat_max
    }

    fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.lon_min, self.lat_max),
            (self.lon_max, self.lat_max),
            (self.lon_min, self.lat_min),
            (self.lon_max, self.lat_min),
        ]
    }
}

/// The area to cut out: one box, or two when crossing the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoRegion {
    /// A box that does not cross the antimeridian.
    Single(GeoBoundingBox),
    /// A box split at the antimeridian.
    Split {
        /// Part ending at +180.
        west: GeoBoundingBox,
        /// Part starting at -180.
        east: GeoBoundingBox,
    },
}

impl GeoRegion {
    /// The boxes making up this region, west to east.
    pub fn parts(&self) -> Vec<GeoBoundingBox> {
        match *self {
            GeoRegion::Single(bbox) => vec![bbox],
            GeoRegion::Split { west, east } => vec![west, east],
        }
    }

    /// Whether the region was split at the antimeridian.
    pub fn is_split(&self) -> bool {
        matches!(self, GeoRegion::Split { .. })
    }

    /// The region as one continuous box, with `lon_max` past +180 when split.
    pub fn unwrapped(&self) -> GeoBoundingBox {
        match *self {
            GeoRegion::Single(bbox) => bbox,
            GeoRegion::Split { west, east } => GeoBoundingBox::new(
                west.lon_min,
                east.lon_max + 360.0,
                west.lat_min,
                west.lat_max,
            ),
        }
    }
}

/// Box of `size_deg` degrees on each side centered on (`center_lon`, `center_lat`).
pub fn bounding_box(center_lon: f64, center_lat: f64, size_deg: f64) -> Result<GeoRegion> {
    bounding_box_with_sides(center_lon, center_lat, size_deg, size_deg)
}

/// Box with separate longitude and latitude extents, in degrees.
pub fn bounding_box_with_sides(
    center_lon: f64,
    center_lat: f64,
    lon_size: f64,
    lat_size: f64,
) -> Result<GeoRegion> {
    for (label, size) in [("longitude", lon_size), ("latitude", lat_size)] {
        if !size.is_finite() || size <= 0.0 {
            return Err(DemError::UnsupportedRegion(format!(
                "{label} size must be a positive number of degrees, got {size}"
            )));
        }
    }
    if !center_lon.is_finite() || !(-90.0..=90.0).contains(&center_lat) {
        return Err(DemError::UnsupportedRegion(format!(
            "invalid center ({center_lon}, {center_lat})"
        )));
    }

    let lat_min = (center_lat - lat_size / 2.0).max(-90.0);
    let lat_max = (center_lat + lat_size / 2.0).min(90.0);

    if lon_size >= 360.0 {
        return Ok(GeoRegion::Single(GeoBoundingBox::new(-180.0, 180.0, lat_min, lat_max)));
    }

    let center_lon = normalize_lon(center_lon);
    let lon_min = center_lon - lon_size / 2.0;
    let lon_max = center_lon + lon_size / 2.0;

    let region = if lon_min < -180.0 {
        GeoRegion::Split {
            west: GeoBoundingBox::new(lon_min + 360.0, 180.0, lat_min, lat_max),
            east: GeoBoundingBox::new(-180.0, lon_max, lat_min, lat_max),
        }
    } else if lon_max > 180.0 {
        GeoRegion::Split {
            west: GeoBoundingBox::new(lon_min, 180.0, lat_min, lat_max),
            east: GeoBoundingBox::new(-180.0, lon_max - 360.0, lat_min, lat_max),
        }
    } else {
        GeoRegion::Single(GeoBoundingBox::new(lon_min, lon_max, lat_min, lat_max))
    };
    Ok(region)
}

/// Degrees of arc spanned by `km` kilometers on a sphere of `radius_m` meters.
pub fn degrees_from_km(km: f64, radius_m: f64) -> f64 {
    (km * 1000.0 / radius_m).to_degrees()
}

/// An integer pixel rectangle inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterWindow {
    pub col_off: u32,
    pub row_off: u32,
    pub width: u32,
    pub height: u32,
    /// Set when the requested area extended past the raster and was cut.
    pub clipped: bool,
}

impl RasterWindow {
    /// An unclipped window.
    pub fn new(col_off: u32, row_off: u32, width: u32, height: u32) -> Self {
        Self { col_off, row_off, width, height, clipped: false }
    }

    /// Whether the window lies inside a `raster_width` x `raster_height` raster.
    pub fn fits(&self, raster_width: u32, raster_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.col_off) + u64::from(self.width) <= u64::from(raster_width)
            && u64::from(self.row_off) + u64::from(self.height) <= u64::from(raster_height)
    }

    /// Number of pixels in the window.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Affine transform of the window, given the raster's transform.
    pub fn transform(&self, raster_transform: &AffineTransform) -> AffineTransform {
        raster_transform.window_transform(f64::from(self.col_off), f64::from(self.row_off))
    }
}

/// Pixel window enclosing `bbox` in a raster.
///
/// The box corners are projected into raster coordinates and mapped through
/// the inverse of `transform`; the enclosing integer rectangle is clipped to
/// the raster. Fails with [`DemError::OutOfBounds`] when nothing remains.
pub fn to_pixel_window(
    bbox: &GeoBoundingBox,
    projection: &Projection,
    transform: &AffineTransform,
    raster_width: u32,
    raster_height: u32,
) -> Result<RasterWindow> {
    let inverse = transform.inverse()?;

    let mut col_min = f64::INFINITY;
    let mut col_max = f64::NEG_INFINITY;
    let mut row_min = f64::INFINITY;
    let mut row_max = f64::NEG_INFINITY;
    for (lon, lat) in bbox.corners() {
        let (x, y) = projection.forward(lon, lat).ok_or_else(|| {
            DemError::Projection(format!("corner ({lon}, {lat}) cannot be projected with {projection}"))
        })?;
        let (col, row) = inverse.apply(x, y);
        col_min = col_min.min(col);
        col_max = col_max.max(col);
        row_min = row_min.min(row);
        row_max = row_max.max(row);
    }

    let out_of_bounds = || DemError::OutOfBounds {
        lon_min: bbox.lon_min,
        lon_max: bbox.lon_max,
        lat_min: bbox.lat_min,
        lat_max: bbox.lat_max,
    };

    let (c0, c1) = enclosing_range(col_min, col_max);
    let (r0, r1) = enclosing_range(row_min, row_max);
    let (cc0, cc1) = (c0.max(0), c1.min(i64::from(raster_width)));
    let (rc0, rc1) = (r0.max(0), r1.min(i64::from(raster_height)));
    if cc1 <= cc0 || rc1 <= rc0 {
        return Err(out_of_bounds());
    }

    Ok(RasterWindow {
        col_off: cc0 as u32,
        row_off: rc0 as u32,
        width: (cc1 - cc0) as u32,
        height: (rc1 - rc0) as u32,
        clipped: (cc0, cc1, rc0, rc1) != (c0, c1, r0, r1),
    })
}

/// Integer half-open range enclosing [`lo`, `hi`], tolerant of rounding noise.
fn enclosing_range(lo: f64, hi: f64) -> (i64, i64) {
    const LIMIT: f64 = 1e12;
    let start = (lo + PIXEL_SNAP).floor().clamp(-LIMIT, LIMIT) as i64;
    let end = (hi - PIXEL_SNAP).ceil().clamp(-LIMIT, LIMIT) as i64;
    (start, end.max(start))
}

/// Window computations against one raster's georeferencing.
#[derive(Debug, Clone, Copy)]
pub struct GeoWindow {
    projection: Projection,
    transform: AffineTransform,
    width: u32,
    height: u32,
}

impl GeoWindow {
    /// Window calculator for a raster.
    pub fn new(projection: Projection, transform: AffineTransform, width: u32, height: u32) -> Self {
        Self { projection, transform, width, height }
    }

    /// Pixel window for a single box.
    pub fn pixel_window(&self, bbox: &GeoBoundingBox) -> Result<RasterWindow> {
        to_pixel_window(bbox, &self.projection, &self.transform, self.width, self.height)
    }

    /// Pixel windows for every part of `region` that touches the raster.
    ///
    /// Parts entirely outside the raster are dropped; if none remain the
    /// whole region is reported as out of bounds.
    pub fn windows(&self, region: &GeoRegion) -> Result<Vec<RasterWindow>> {
        let mut windows = Vec::with_capacity(2);
        for part in region.parts() {
            match self.pixel_window(&part) {
                Ok(window) => windows.push(window),
                Err(DemError::OutOfBounds { .. }) => {
                    tracing::debug!(?part, "region part lies outside the raster");
                }
                Err(e) => return Err(e),
            }
        }
        if windows.is_empty() {
            let whole = region.unwrapped();
            return Err(DemError::OutOfBounds {
                lon_min: whole.lon_min,
                lon_max: whole.lon_max,
                lat_min: whole.lat_min,
                lat_max: whole.lat_max,
            });
        }
        Ok(windows)
    }
}
