//! Georeferenced elevation grids.

use crate::{AffineTransform, DemError, Projection, Result};
use serde::Serialize;

/// Nodata sentinel used when a grid has none of its own (LOLA is int16).
pub const DEFAULT_NODATA: f32 = -32768.0;

/// A block of elevation samples with its georeferencing.
///
/// Samples are stored row-major, north to south and west to east for
/// north-up transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
    data: Vec<f32>,
    width: u32,
    height: u32,
    transform: AffineTransform,
    projection: Projection,
    nodata: Option<f32>,
}

/// Summary statistics over the valid samples of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridStats {
    pub min: f32,
    pub max: f32,
    pub mean: f64,
    pub valid_count: usize,
    pub nodata_count: usize,
}

impl ElevationGrid {
    /// Create a grid, checking that `data` matches the dimensions.
    pub fn new(
        data: Vec<f32>,
        width: u32,
        height: u32,
        transform: AffineTransform,
        projection: Projection,
        nodata: Option<f32>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(DemError::InvalidGrid(format!(
                "{} samples for a {width}x{height} grid",
                data.len()
            )));
        }
        Ok(Self { data, width, height, transform, projection, nodata })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the dimensions of this grid in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Consume the grid and return its samples.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    /// The grid's nodata value, or [`DEFAULT_NODATA`].
    pub fn nodata_or_default(&self) -> f32 {
        self.nodata.unwrap_or(DEFAULT_NODATA)
    }

    /// Raw sample at a pixel, `None` outside the grid.
    pub fn get(&self, col: u32, row: u32) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row as usize * self.width as usize + col as usize])
    }

    /// Whether `value` marks a missing sample.
    pub fn is_nodata(&self, value: f32) -> bool {
        if value.is_nan() {
            return true;
        }
        match self.nodata {
            Some(nodata) => (value - nodata).abs() < 0.001,
            None => false,
        }
    }

    /// Projected coordinates of the four outer corners (NW, NE, SW, SE).
    pub fn corner_coords(&self) -> [(f64, f64); 4] {
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(w, 0.0),
            self.transform.apply(0.0, h),
            self.transform.apply(w, h),
        ]
    }

    /// Enclosing rectangle in projected coordinates: (min_x, min_y, max_x, max_y).
    pub fn footprint(&self) -> (f64, f64, f64, f64) {
        self.corner_coords().iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }

    /// Projected coordinates of the grid center.
    pub fn center_coords(&self) -> (f64, f64) {
        self.transform
            .apply(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }

    /// Multiply every valid sample by `factor`; nodata is left untouched.
    pub fn scale_values(&mut self, factor: f32) {
        if factor == 1.0 {
            return;
        }
        let nodata = self.nodata;
        for value in &mut self.data {
            let missing = value.is_nan() || nodata.is_some_and(|n| (*value - n).abs() < 0.001);
            if !missing {
                *value *= factor;
            }
        }
    }

    /// Statistics over valid samples; `None` when every sample is nodata.
    pub fn stats(&self) -> Option<GridStats> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut valid_count = 0usize;
        for &value in &self.data {
            if self.is_nodata(value) {
                continue;
            }
            min = min.min(value);
            max = max.max(value);
            sum += f64::from(value);
            valid_count += 1;
        }
        (valid_count > 0).then(|| GridStats {
            min,
            max,
            mean: sum / valid_count as f64,
            valid_count,
            nodata_count: self.data.len() - valid_count,
        })
    }

    /// Downsample by averaging `factor` x `factor` blocks.
    ///
    /// Nodata samples are skipped; a block with no valid samples becomes
    /// nodata. Partial blocks at the right and bottom edges are dropped.
    pub fn downsample_mean(&self, factor: u32) -> Result<Self> {
        if factor == 0 {
            return Err(DemError::InvalidGrid("downsampling factor must be positive".into()));
        }
        let out_w = self.width / factor;
        let out_h = self.height / factor;
        if out_w == 0 || out_h == 0 {
            return Err(DemError::InvalidGrid(format!(
                "factor {factor} is larger than the {}x{} grid",
                self.width, self.height
            )));
        }
        let fill = self.nodata_or_default();
        let mut data = Vec::with_capacity(out_w as usize * out_h as usize);
        for by in 0..out_h {
            for bx in 0..out_w {
                let mut sum = 0.0f64;
                let mut count = 0u32;
                for row in by * factor..(by + 1) * factor {
                    let start = row as usize * self.width as usize;
                    for col in bx * factor..(bx + 1) * factor {
                        let value = self.data[start + col as usize];
                        if !self.is_nodata(value) {
                            sum += f64::from(value);
                            count += 1;
                        }
                    }
                }
                data.push(if count > 0 { (sum / f64::from(count)) as f32 } else { fill });
            }
        }
        let nodata = self.nodata.or_else(|| (data.iter().any(|&v| v == fill)).then_some(fill));
        Self::new(
            data,
            out_w,
            out_h,
            self.transform.scaled(f64::from(factor)),
            self.projection,
            nodata,
        )
    }

    /// Join grids that share rows side by side, west to east.
    ///
    /// The result keeps the first grid's transform, so coordinates continue
    /// past the first grid's east edge (used for antimeridian stitching).
    pub fn hstack(parts: Vec<ElevationGrid>) -> Result<Self> {
        let mut iter = parts.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| DemError::InvalidGrid("nothing to stitch".into()))?;
        let rest: Vec<ElevationGrid> = iter.collect();
        if rest.is_empty() {
            return Ok(first);
        }
        if let Some(bad) = rest.iter().find(|g| g.height != first.height) {
            return Err(DemError::InvalidGrid(format!(
                "cannot stitch grids of height {} and {}",
                first.height, bad.height
            )));
        }

        let width = first.width + rest.iter().map(|g| g.width).sum::<u32>();
        let mut data = Vec::with_capacity(width as usize * first.height as usize);
        for row in 0..first.height as usize {
            for grid in std::iter::once(&first).chain(rest.iter()) {
                let w = grid.width as usize;
                data.extend_from_slice(&grid.data[row * w..(row + 1) * w]);
            }
        }
        Self::new(data, width, first.height, first.transform, first.projection, first.nodata)
    }
}
