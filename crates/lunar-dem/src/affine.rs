//! Affine transform between pixel indices and raster coordinates.

use crate::{DemError, Result};
use serde::{Deserialize, Serialize};

/// Determinants smaller than this are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-15;

/// A 6-coefficient affine transform.
///
/// Maps a (column, row) pixel position to raster coordinates:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// Pixel positions are continuous: the top-left corner of pixel (0, 0) is
/// (0.0, 0.0) and its center is (0.5, 0.5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    /// Create a transform from its six coefficients.
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform with the top-left corner at (`west`, `north`).
    ///
    /// `x_res` and `y_res` are positive pixel sizes; rows grow southward.
    pub fn from_origin(west: f64, north: f64, x_res: f64, y_res: f64) -> Self {
        Self::new(x_res, 0.0, west, 0.0, -y_res, north)
    }

    /// Build from a GDAL geotransform `[c, a, b, f, d, e]`.
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    /// The transform as a GDAL geotransform `[c, a, b, f, d, e]`.
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// Map a pixel position to raster coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Whether the transform can be inverted.
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det.is_finite() && det.abs() > SINGULAR_EPSILON
    }

    /// The inverse transform, mapping raster coordinates back to pixels.
    pub fn inverse(&self) -> Result<Self> {
        if !self.is_invertible() {
            return Err(DemError::Projection(format!(
                "affine transform is not invertible (determinant {})",
                self.determinant()
            )));
        }
        let inv_det = 1.0 / self.determinant();
        let a = self.e * inv_det;
        let b = -self.b * inv_det;
        let d = -self.d * inv_det;
        let e = self.a * inv_det;
        let c = -(a * self.c + b * self.f);
        let f = -(d * self.c + e * self.f);
        Ok(Self::new(a, b, c, d, e, f))
    }

    /// Whether rows and columns are axis aligned (no rotation or shear).
    pub fn is_north_up(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }

    /// Pixel size along each axis, as positive values.
    pub fn resolution(&self) -> (f64, f64) {
        (
            (self.a * self.a + self.d * self.d).sqrt(),
            (self.b * self.b + self.e * self.e).sqrt(),
        )
    }

    /// Transform of a sub-window whose top-left pixel is (`col_off`, `row_off`).
    pub fn window_transform(&self, col_off: f64, row_off: f64) -> Self {
        let (c, f) = self.apply(col_off, row_off);
        Self::new(self.a, self.b, c, self.d, self.e, f)
    }

    /// Transform of the same footprint sampled `factor` times coarser.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.a * factor,
            self.b * factor,
            self.c,
            self.d * factor,
            self.e * factor,
            self.f,
        )
    }
}
