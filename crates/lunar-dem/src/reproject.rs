//! Warping grids between projections.
//!
//! The output grid is an inverse mapping: every output pixel center is taken
//! back through the target projection to longitude/latitude, forward through
//! the source projection, and through the inverse source transform to a
//! fractional source pixel, where it is resampled. Points that land outside
//! the source grid become nodata; nothing is extrapolated.

use crate::projection::{normalize_lon, unwrap_lon, LocalProjection};
use crate::{AffineTransform, DemError, ElevationGrid, Projection, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default ceiling on output size, in pixels.
pub const DEFAULT_MAX_PIXELS: usize = 64 * 1024 * 1024;

/// Points sampled along each edge of the source footprint.
const EDGE_SAMPLES: u32 = 16;

/// Resampling kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    /// Value of the source pixel containing the point.
    Nearest,
    /// Weighted mean of the four surrounding pixel centers.
    #[default]
    Bilinear,
    /// Catmull-Rom spline over the surrounding 4x4 pixels.
    Cubic,
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resampling::Nearest => "nearest",
            Resampling::Bilinear => "bilinear",
            Resampling::Cubic => "cubic",
        })
    }
}

impl FromStr for Resampling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" | "near" => Ok(Resampling::Nearest),
            "bilinear" => Ok(Resampling::Bilinear),
            "cubic" | "cubicspline" => Ok(Resampling::Cubic),
            other => Err(format!("unknown resampling '{other}' (expected nearest, bilinear or cubic)")),
        }
    }
}

/// Where to warp a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetProjection {
    /// A local projection centered on the grid's centroid.
    Local(LocalProjection),
    /// A fully specified projection.
    Fixed(Projection),
}

/// Configured warp.
#[derive(Debug, Clone, Copy)]
pub struct Reprojector {
    target: TargetProjection,
    resampling: Resampling,
    resolution: Option<(f64, f64)>,
    max_pixels: usize,
}

impl Reprojector {
    #[must_use]
    pub fn new(target: TargetProjection) -> Self {
        Self {
            target,
            resampling: Resampling::default(),
            resolution: None,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    #[must_use]
    pub fn resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = resampling;
        self
    }

    /// Fix the output pixel size instead of deriving it from the source.
    #[must_use]
    pub fn resolution(mut self, x_res: f64, y_res: f64) -> Self {
        self.resolution = Some((x_res, y_res));
        self
    }

    #[must_use]
    pub fn max_pixels(mut self, max_pixels: usize) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// The concrete projection `grid` would be warped into.
    pub fn target_for(&self, grid: &ElevationGrid) -> Result<Projection> {
        let projection = match self.target {
            TargetProjection::Fixed(projection) => projection,
            TargetProjection::Local(local) => {
                let (lon, lat) = centroid(grid)?;
                local.centered_at(lon, lat, grid.projection().radius())
            }
        };
        projection.validate()?;
        Ok(projection)
    }

    /// Warp `grid` into the target projection.
    pub fn warp(&self, grid: &ElevationGrid) -> Result<ElevationGrid> {
        let target = self.target_for(grid)?;
        let source = *grid.projection();
        let src_inverse = grid.transform().inverse()?;
        // Stitched grids extend past +180; unwrap in the grid's own longitude range
        let (center_lon, _) = source_center(grid)?;

        let (min_x, min_y, max_x, max_y) = footprint_in(grid, &target)?;
        let (x_res, y_res) = match self.resolution {
            Some(res) => res,
            None => self.suggested_resolution(grid, &target, (max_x - min_x, max_y - min_y))?,
        };
        if !(x_res > 0.0 && y_res > 0.0 && x_res.is_finite() && y_res.is_finite()) {
            return Err(DemError::Projection(format!(
                "invalid output resolution {x_res} x {y_res}"
            )));
        }

        let width = pixel_span(max_x - min_x, x_res);
        let height = pixel_span(max_y - min_y, y_res);
        let pixels = width as usize * height as usize;
        if pixels > self.max_pixels {
            return Err(DemError::UnsupportedRegion(format!(
                "warped grid would be {width}x{height} pixels (limit {})",
                self.max_pixels
            )));
        }
        let transform = AffineTransform::from_origin(min_x, max_y, x_res, y_res);
        tracing::debug!(%target, width, height, x_res, y_res, resampling = %self.resampling, "warping grid");

        let fill = grid.nodata_or_default();
        let sampler = Sampler { grid, fill };
        let mut data = Vec::with_capacity(pixels);
        let mut outside = 0usize;
        for row in 0..height {
            for col in 0..width {
                let (x, y) = transform.apply(f64::from(col) + 0.5, f64::from(row) + 0.5);
                let value = target
                    .inverse(x, y)
                    .and_then(|(lon, lat)| source.forward(unwrap_lon(lon, center_lon), lat))
                    .and_then(|(sx, sy)| {
                        let (scol, srow) = src_inverse.apply(sx, sy);
                        sampler.sample(scol, srow, self.resampling)
                    });
                data.push(value.unwrap_or_else(|| {
                    outside += 1;
                    fill
                }));
            }
        }
        if outside > 0 {
            tracing::debug!(outside, total = pixels, "output pixels outside the source grid");
        }

        ElevationGrid::new(data, width, height, transform, target, Some(fill))
    }

    /// Output pixel size approximately preserving the source ground sample distance.
    ///
    /// Local targets get square pixels at the geometric mean of the source
    /// pixel's two ground extents at the centroid. Fixed targets keep the
    /// source pixel counts along each axis.
    fn suggested_resolution(
        &self,
        grid: &ElevationGrid,
        target: &Projection,
        extent: (f64, f64),
    ) -> Result<(f64, f64)> {
        if let TargetProjection::Fixed(_) = self.target {
            return Ok((extent.0 / f64::from(grid.width()), extent.1 / f64::from(grid.height())));
        }

        let (col, row) = (f64::from(grid.width()) / 2.0, f64::from(grid.height()) / 2.0);
        let p0 = project_pixel(grid, target, col, row)?;
        let px = project_pixel(grid, target, col + 1.0, row)?;
        let py = project_pixel(grid, target, col, row + 1.0)?;
        let dx = (px.0 - p0.0).hypot(px.1 - p0.1);
        let dy = (py.0 - p0.0).hypot(py.1 - p0.1);
        let res = (dx * dy).sqrt();
        Ok((res, res))
    }
}

/// Warp with default settings.
pub fn warp(grid: &ElevationGrid, target: TargetProjection) -> Result<ElevationGrid> {
    Reprojector::new(target).warp(grid)
}

/// Longitude and latitude of the grid center.
pub fn centroid(grid: &ElevationGrid) -> Result<(f64, f64)> {
    let (lon, lat) = source_center(grid)?;
    Ok((normalize_lon(lon), lat))
}

/// Grid center without longitude normalization.
fn source_center(grid: &ElevationGrid) -> Result<(f64, f64)> {
    let (x, y) = grid.center_coords();
    grid.projection().inverse(x, y).ok_or_else(|| {
        DemError::Projection(format!("grid center ({x}, {y}) is outside {}", grid.projection()))
    })
}

/// Enclosing rectangle of the grid outline in `target` coordinates.
fn footprint_in(grid: &ElevationGrid, target: &Projection) -> Result<(f64, f64, f64, f64)> {
    let (w, h) = (f64::from(grid.width()), f64::from(grid.height()));
    let mut bounds = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for i in 0..=EDGE_SAMPLES {
        let t = f64::from(i) / f64::from(EDGE_SAMPLES);
        for (col, row) in [(t * w, 0.0), (t * w, h), (0.0, t * h), (w, t * h)] {
            let (x, y) = project_pixel(grid, target, col, row)?;
            bounds = (bounds.0.min(x), bounds.1.min(y), bounds.2.max(x), bounds.3.max(y));
        }
    }
    Ok(bounds)
}

/// Map a source pixel position into `target` coordinates.
fn project_pixel(grid: &ElevationGrid, target: &Projection, col: f64, row: f64) -> Result<(f64, f64)> {
    let (sx, sy) = grid.transform().apply(col, row);
    grid.projection()
        .inverse(sx, sy)
        .and_then(|(lon, lat)| target.forward(lon, lat))
        .ok_or_else(|| {
            DemError::Projection(format!(
                "source pixel ({col}, {row}) cannot be represented in {target}"
            ))
        })
}

/// Whole pixels needed to cover `extent`, tolerant of rounding noise.
fn pixel_span(extent: f64, res: f64) -> u32 {
    let n = (extent / res - 1e-6).ceil();
    if n.is_finite() && n >= 1.0 {
        n.min(f64::from(u32::MAX)) as u32
    } else {
        1
    }
}

struct Sampler<'a> {
    grid: &'a ElevationGrid,
    fill: f32,
}

impl Sampler<'_> {
    /// Sample at continuous pixel position (`col`, `row`).
    ///
    /// `None` when the position is outside the grid. Kernels that touch a
    /// nodata pixel fall back to the next simpler kernel.
    fn sample(&self, col: f64, row: f64, resampling: Resampling) -> Option<f32> {
        let (w, h) = (f64::from(self.grid.width()), f64::from(self.grid.height()));
        if !(col >= 0.0 && row >= 0.0 && col <= w && row <= h) {
            return None;
        }
        // Index space with pixel centers on integers
        let (x, y) = ((col - 0.5).clamp(0.0, w - 1.0), (row - 0.5).clamp(0.0, h - 1.0));
        Some(match resampling {
            Resampling::Nearest => self.nearest(col, row),
            Resampling::Bilinear => self.bilinear(x, y).unwrap_or_else(|| self.nearest(col, row)),
            Resampling::Cubic => self
                .cubic(x, y)
                .or_else(|| self.bilinear(x, y))
                .unwrap_or_else(|| self.nearest(col, row)),
        })
    }

    fn at(&self, col: i64, row: i64) -> f32 {
        let c = col.clamp(0, i64::from(self.grid.width()) - 1) as usize;
        let r = row.clamp(0, i64::from(self.grid.height()) - 1) as usize;
        self.grid.data()[r * self.grid.width() as usize + c]
    }

    fn valid(&self, value: f32) -> Option<f32> {
        (!self.grid.is_nodata(value)).then_some(value)
    }

    fn nearest(&self, col: f64, row: f64) -> f32 {
        let value = self.at(col.floor() as i64, row.floor() as i64);
        self.valid(value).unwrap_or(self.fill)
    }

    fn bilinear(&self, x: f64, y: f64) -> Option<f32> {
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (c, r) = (x0 as i64, y0 as i64);
        let v00 = f64::from(self.valid(self.at(c, r))?);
        let v10 = f64::from(self.valid(self.at(c + 1, r))?);
        let v01 = f64::from(self.valid(self.at(c, r + 1))?);
        let v11 = f64::from(self.valid(self.at(c + 1, r + 1))?);
        let top = v00 * (1.0 - fx) + v10 * fx;
        let bottom = v01 * (1.0 - fx) + v11 * fx;
        Some((top * (1.0 - fy) + bottom * fy) as f32)
    }

    fn cubic(&self, x: f64, y: f64) -> Option<f32> {
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (c, r) = (x0 as i64, y0 as i64);
        let mut rows = [0.0f64; 4];
        for (j, value) in rows.iter_mut().enumerate() {
            let rr = r + j as i64 - 1;
            let mut p = [0.0f64; 4];
            for (i, sample) in p.iter_mut().enumerate() {
                *sample = f64::from(self.valid(self.at(c + i as i64 - 1, rr))?);
            }
            *value = catmull_rom(p, fx);
        }
        Some(catmull_rom(rows, fy) as f32)
    }
}

/// 1D Catmull-Rom spline through p1..p2.
fn catmull_rom([p0, p1, p2, p3]: [f64; 4], t: f64) -> f64 {
    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    ((a * t + b) * t + c) * t + p1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::MOON_RADIUS_M;
    use approx::assert_relative_eq;

    /// Equirectangular grid over `lon`/`lat` ranges with value = col + 100 * row.
    fn eqc_grid(lon: (f64, f64), lat: (f64, f64), width: u32, height: u32) -> ElevationGrid {
        let projection = Projection::lunar_equirectangular();
        let (west, north) = projection.forward(lon.0, lat.1).unwrap();
        let (east, south) = projection.forward(lon.1, lat.0).unwrap();
        let transform = AffineTransform::from_origin(
            west,
            north,
            (east - west) / f64::from(width),
            (north - south) / f64::from(height),
        );
        let data = (0..height)
            .flat_map(|r| (0..width).map(move |c| c as f32 + 100.0 * r as f32))
            .collect();
        ElevationGrid::new(data, width, height, transform, projection, Some(-32768.0)).unwrap()
    }

    fn tiny(data: Vec<f32>, width: u32, height: u32) -> ElevationGrid {
        ElevationGrid::new(
            data,
            width,
            height,
            AffineTransform::from_origin(0.0, f64::from(height), 1.0, 1.0),
            Projection::Geographic { radius: MOON_RADIUS_M },
            Some(-1.0),
        )
        .unwrap()
    }

    #[test]
    fn test_resampling_parse() {
        assert_eq!("Bilinear".parse::<Resampling>(), Ok(Resampling::Bilinear));
        assert_eq!("near".parse::<Resampling>(), Ok(Resampling::Nearest));
        assert_eq!("cubicspline".parse::<Resampling>(), Ok(Resampling::Cubic));
        assert!("lanczos".parse::<Resampling>().is_err());
        assert_eq!(Resampling::default(), Resampling::Bilinear);
    }

    #[test]
    fn test_bilinear_between_centers() {
        let grid = tiny(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let sampler = Sampler { grid: &grid, fill: -1.0 };
        // Pixel centers sit at 0.5 and 1.5
        assert_eq!(sampler.sample(0.5, 0.5, Resampling::Bilinear), Some(1.0));
        assert_eq!(sampler.sample(1.0, 1.0, Resampling::Bilinear), Some(2.5));
        assert_eq!(sampler.sample(1.5, 0.5, Resampling::Bilinear), Some(2.0));
        // Half-pixel border clamps to the edge value
        assert_eq!(sampler.sample(0.1, 0.1, Resampling::Bilinear), Some(1.0));
        assert_eq!(sampler.sample(2.1, 1.0, Resampling::Bilinear), None);
        assert_eq!(sampler.sample(-0.1, 1.0, Resampling::Nearest), None);
    }

    #[test]
    fn test_nodata_neighbor_falls_back_to_nearest() {
        let grid = tiny(vec![1.0, -1.0, 3.0, 4.0], 2, 2);
        let sampler = Sampler { grid: &grid, fill: -1.0 };
        assert_eq!(sampler.sample(0.9, 0.9, Resampling::Bilinear), Some(1.0));
        assert_eq!(sampler.sample(1.1, 0.9, Resampling::Bilinear), Some(-1.0));
        assert_eq!(sampler.sample(1.1, 1.1, Resampling::Cubic), Some(4.0));
    }

    #[test]
    fn test_cubic_reproduces_linear_ramp() {
        let data = (0..25).map(|i| (i % 5) as f32 * 2.0).collect();
        let grid = tiny(data, 5, 5);
        let sampler = Sampler { grid: &grid, fill: -1.0 };
        let value = sampler.sample(2.25, 2.5, Resampling::Cubic).unwrap();
        assert_relative_eq!(value, 3.5, epsilon = 1e-5);
    }

    #[test]
    fn test_warp_into_own_projection_keeps_footprint() {
        let grid = eqc_grid((-14.0, -9.0), (-46.0, -41.0), 40, 40);
        let warped = warp(&grid, TargetProjection::Fixed(*grid.projection())).unwrap();
        assert_eq!(warped.dimensions(), grid.dimensions());
        let (a, b) = (warped.footprint(), grid.footprint());
        assert_relative_eq!(a.0, b.0, max_relative = 1e-9);
        assert_relative_eq!(a.1, b.1, max_relative = 1e-9);
        assert_relative_eq!(a.2, b.2, max_relative = 1e-9);
        assert_relative_eq!(a.3, b.3, max_relative = 1e-9);
        for (&w, &g) in warped.data().iter().zip(grid.data()) {
            assert_relative_eq!(w, g, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_local_warp_preserves_pixel_budget() {
        let grid = eqc_grid((-13.86, -8.86), (-45.81, -40.81), 80, 80);
        let reprojector = Reprojector::new(TargetProjection::Local(LocalProjection::Orthographic));
        let target = reprojector.target_for(&grid).unwrap();
        match target {
            Projection::Orthographic { lat_0, lon_0, .. } => {
                assert_relative_eq!(lon_0, -11.36, epsilon = 1e-9);
                assert_relative_eq!(lat_0, -43.31, epsilon = 1e-9);
            }
            other => panic!("unexpected target {other}"),
        }

        let warped = reprojector.warp(&grid).unwrap();
        let (x_res, y_res) = warped.transform().resolution();
        assert_relative_eq!(x_res, y_res);
        // Square pixels of the source's mean ground size: about as many pixels
        // as the source, plus the corners of the curved outline's bounding box
        let ratio = warped.data().len() as f64 / grid.data().len() as f64;
        assert!((0.95..1.3).contains(&ratio), "pixel ratio {ratio}");
        // The centroid lands in the middle of the output
        let (cx, cy) = warped.center_coords();
        assert!(cx.abs() < x_res && cy.abs() < y_res);
        let center = warped.get(warped.width() / 2, warped.height() / 2).unwrap();
        assert!(!warped.is_nodata(center));
    }

    #[test]
    fn test_local_warp_corners_are_nodata() {
        let grid = eqc_grid((-20.0, 20.0), (50.0, 80.0), 80, 60);
        let warped = warp(&grid, TargetProjection::Local(LocalProjection::AzimuthalEquidistant)).unwrap();
        // The footprint is a curved wedge near the pole; its bounding box has empty corners
        let nodata = warped.data().iter().filter(|&&v| warped.is_nodata(v)).count();
        assert!(nodata > 0);
        assert_eq!(warped.nodata(), Some(-32768.0));
    }

    #[test]
    fn test_warp_rejects_hidden_footprint() {
        let grid = eqc_grid((-10.0, 10.0), (-10.0, 10.0), 10, 10);
        let far_side = Projection::Orthographic { radius: MOON_RADIUS_M, lat_0: 0.0, lon_0: 180.0 };
        let err = warp(&grid, TargetProjection::Fixed(far_side)).unwrap_err();
        assert!(matches!(err, DemError::Projection(_)));
    }

    #[test]
    fn test_warp_guard_and_invalid_target() {
        let grid = eqc_grid((-1.0, 1.0), (-1.0, 1.0), 10, 10);
        let err = Reprojector::new(TargetProjection::Local(LocalProjection::Orthographic))
            .resolution(1.0, 1.0)
            .max_pixels(1000)
            .warp(&grid)
            .unwrap_err();
        assert!(matches!(err, DemError::UnsupportedRegion(_)));

        let bad = Projection::Orthographic { radius: -1.0, lat_0: 0.0, lon_0: 0.0 };
        assert!(matches!(
            warp(&grid, TargetProjection::Fixed(bad)),
            Err(DemError::Projection(_))
        ));
    }
}
