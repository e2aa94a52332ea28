//! Windowed access to a single-band GeoTIFF elevation raster.

use crate::geokeys::{GeoKeys, GT_RASTER_TYPE};
use crate::window::{GeoRegion, GeoWindow, RasterWindow};
use crate::{AffineTransform, DemError, ElevationGrid, Projection, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;

/// Where the global LOLA mosaic can be downloaded.
pub const LOLA_URL: &str =
    "http://planetarymaps.usgs.gov/mosaic/Lunar_LRO_LOLA_Global_LDEM_118m_Mar2014.tif";

/// GeoTIFF raster type value for point-sampled rasters.
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Georeferencing and layout of an opened raster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterMetadata {
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
    /// Pixel to raster-coordinate transform.
    pub transform: AffineTransform,
    /// Projection of the raster coordinates.
    pub projection: Projection,
    /// Nodata value from the GDAL_NODATA tag.
    pub nodata: Option<f32>,
    /// Width of a storage chunk (tile or strip).
    pub chunk_width: u32,
    /// Height of a storage chunk (tile or strip).
    pub chunk_height: u32,
    /// Sample bit depth.
    pub bits_per_sample: u8,
}

impl RasterMetadata {
    /// Window calculator for this raster.
    pub fn geo_window(&self) -> GeoWindow {
        GeoWindow::new(self.projection, self.transform, self.width, self.height)
    }

    /// Window covering the whole raster.
    pub fn full_window(&self) -> RasterWindow {
        RasterWindow::new(0, 0, self.width, self.height)
    }

    fn chunks_across(&self) -> u32 {
        self.width.div_ceil(self.chunk_width)
    }
}

/// An open elevation raster.
///
/// Only the storage chunks intersecting a requested window are decoded, so
/// reading a few hundred pixels out of the 92160 x 46080 LOLA mosaic stays
/// cheap. A source holds an open file handle and is not shared between
/// threads; use [`RasterSource::reopen`] to get an independent handle.
pub struct RasterSource {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    metadata: RasterMetadata,
    value_scale: f32,
    reads: u64,
}

impl std::fmt::Debug for RasterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSource")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .field("value_scale", &self.value_scale)
            .field("reads", &self.reads)
            .finish()
    }
}

impl RasterSource {
    /// Open a GeoTIFF, taking its projection from the GeoKeys.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_inner(path.as_ref(), None)
    }

    /// Open a GeoTIFF whose projection is known (or mis-tagged).
    pub fn open_with_projection<P: AsRef<Path>>(path: P, projection: Projection) -> Result<Self> {
        projection.validate()?;
        Self::open_inner(path.as_ref(), Some(projection))
    }

    fn open_inner(path: &Path, projection: Option<Projection>) -> Result<Self> {
        if !path.exists() {
            return Err(DemError::RasterMissing {
                path: path.display().to_string(),
                url: LOLA_URL,
            });
        }
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        // Only chunk-sized buffers are ever allocated, but GeoKey and strip
        // offset arrays of the global mosaic are large
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
        limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        let bits_per_sample = match decoder.colortype()? {
            ColorType::Gray(bits) => bits,
            other => {
                return Err(DemError::UnsupportedDataType(format!(
                    "expected a single-band raster, found {other:?}"
                )))
            }
        };

        let keys = read_geokeys(&mut decoder)?;
        let projection = match (projection, &keys) {
            (Some(projection), _) => projection,
            (None, Some(keys)) => keys.to_projection()?,
            (None, None) => {
                return Err(DemError::InvalidGeoTiff(
                    "no GeoKeyDirectory; the projection must be given explicitly".into(),
                ))
            }
        };
        let point_sampled = keys
            .as_ref()
            .and_then(|k| k.short(GT_RASTER_TYPE))
            .is_some_and(|t| t == RASTER_PIXEL_IS_POINT);
        let transform = read_transform(&mut decoder, point_sampled)?;
        if !transform.is_invertible() {
            return Err(DemError::InvalidGeoTiff("raster transform is singular".into()));
        }
        let nodata = read_nodata_value(&mut decoder);
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();

        let metadata = RasterMetadata {
            width,
            height,
            transform,
            projection,
            nodata,
            chunk_width,
            chunk_height,
            bits_per_sample,
        };
        tracing::debug!(
            path = %path.display(),
            width,
            height,
            %projection,
            chunk_width,
            chunk_height,
            "opened raster"
        );

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            metadata,
            value_scale: 1.0,
            reads: 0,
        })
    }

    /// Multiply every sample read by `scale` (nodata excluded).
    pub fn with_value_scale(mut self, scale: f32) -> Self {
        self.value_scale = scale;
        self
    }

    /// An independent handle on the same file with the same settings.
    pub fn reopen(&self) -> Result<Self> {
        Ok(Self::open_inner(&self.path, Some(self.metadata.projection))?
            .with_value_scale(self.value_scale))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    pub fn value_scale(&self) -> f32 {
        self.value_scale
    }

    /// Number of window reads performed through this handle.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Read a pixel window.
    ///
    /// The window must lie inside the raster; the returned grid carries the
    /// window's own transform.
    pub fn read_window(&mut self, window: &RasterWindow) -> Result<ElevationGrid> {
        let meta = &self.metadata;
        if !window.fits(meta.width, meta.height) {
            return Err(DemError::WindowOutOfRange {
                col_off: window.col_off,
                row_off: window.row_off,
                width: window.width,
                height: window.height,
                raster_width: meta.width,
                raster_height: meta.height,
            });
        }

        let (chunk_w, chunk_h) = (meta.chunk_width, meta.chunk_height);
        let chunks_across = meta.chunks_across();
        let (col_end, row_end) = (window.col_off + window.width, window.row_off + window.height);
        let out_width = window.width as usize;
        let mut out = vec![0.0f32; window.pixel_count()];

        for cy in window.row_off / chunk_h..=(row_end - 1) / chunk_h {
            for cx in window.col_off / chunk_w..=(col_end - 1) / chunk_w {
                let index = cy * chunks_across + cx;
                let (data_w, data_h) = self.decoder.chunk_data_dimensions(index);
                let values = decode_samples(self.decoder.read_chunk(index)?);
                if data_h == 0 || values.len() < data_w as usize * data_h as usize {
                    return Err(DemError::InvalidGeoTiff(format!("chunk {index} is truncated")));
                }
                // Edge chunks may come back padded to the full chunk width
                let stride = values.len() / data_h as usize;

                let (x0, y0) = (cx * chunk_w, cy * chunk_h);
                let c0 = x0.max(window.col_off);
                let c1 = (x0 + data_w).min(col_end);
                let r0 = y0.max(window.row_off);
                let r1 = (y0 + data_h).min(row_end);
                if c1 <= c0 || r1 <= r0 {
                    continue;
                }
                let len = (c1 - c0) as usize;
                for row in r0..r1 {
                    let src = (row - y0) as usize * stride + (c0 - x0) as usize;
                    let dst = (row - window.row_off) as usize * out_width + (c0 - window.col_off) as usize;
                    out[dst..dst + len].copy_from_slice(&values[src..src + len]);
                }
            }
        }
        self.reads += 1;

        let mut grid = ElevationGrid::new(
            out,
            window.width,
            window.height,
            window.transform(&meta.transform),
            meta.projection,
            meta.nodata,
        )?;
        grid.scale_values(self.value_scale);
        Ok(grid)
    }

    /// Read every part of a region and stitch the parts west to east.
    pub fn read_region(&mut self, region: &GeoRegion) -> Result<ElevationGrid> {
        let windows = self.metadata.geo_window().windows(region)?;
        let mut parts = Vec::with_capacity(windows.len());
        for window in &windows {
            if window.clipped {
                tracing::warn!(?window, "region extends past the raster edge; clipping");
            }
            parts.push(self.read_window(window)?);
        }
        ElevationGrid::hstack(parts)
    }
}

fn read_geokeys<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Option<GeoKeys>> {
    let Ok(directory) = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag) else {
        return Ok(None);
    };
    let doubles = decoder.get_tag_f64_vec(Tag::GeoDoubleParamsTag).unwrap_or_default();
    let ascii = decoder.get_tag_ascii_string(Tag::GeoAsciiParamsTag).unwrap_or_default();
    GeoKeys::parse(&directory, &doubles, &ascii).map(Some)
}

/// Read the pixel-to-model transform.
///
/// ModelTransformation wins when present; otherwise ModelPixelScale and
/// ModelTiepoint describe a north-up raster.
fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    point_sampled: bool,
) -> Result<AffineTransform> {
    let transform = if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() < 16 {
            return Err(DemError::InvalidGeoTiff(format!(
                "ModelTransformation has {} values, expected 16",
                m.len()
            )));
        }
        AffineTransform::new(m[0], m[1], m[3], m[4], m[5], m[7])
    } else {
        let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
        let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);
        match (tiepoint, scale) {
            (Ok(tie), Ok(scale)) if tie.len() >= 6 && scale.len() >= 2 => {
                // Tiepoint format: [i, j, k, x, y, z]; rows grow southward
                let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
                AffineTransform::new(scale[0], 0.0, x - i * scale[0], 0.0, -scale[1], y + j * scale[1])
            }
            _ => {
                return Err(DemError::InvalidGeoTiff(
                    "missing ModelTransformation or ModelTiepoint/ModelPixelScale".into(),
                ))
            }
        }
    };
    // Point-sampled rasters tie model coordinates to pixel centers
    Ok(if point_sampled { transform.window_transform(-0.5, -0.5) } else { transform })
}

/// Parse the GDAL_NODATA tag, an ASCII number.
fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let value = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(value, "ignoring unparseable GDAL_NODATA tag");
            None
        }
    }
}

fn decode_samples(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f32::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f32::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(data) => data.into_iter().map(f32::from).collect(),
        DecodingResult::I8(data) => data.into_iter().map(f32::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
    }
}
