//! Output encoders for elevation grids.
//!
//! GeoTIFFs are written as single-band 32-bit float images with the grid's
//! transform, user-defined GeoKeys and a PROJ citation, so the output opens
//! in GDAL-based tools and round-trips through [`crate::RasterSource`].
//! ESRI ASCII grids get a `.prj` sidecar holding the PROJ string.

use crate::geokeys::GeoKeys;
use crate::{DemError, ElevationGrid, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::compression::{Compression, Deflate, DeflateLevel, Lzw, Uncompressed};
use tiff::encoder::{DirectoryEncoder, ImageEncoder, TiffEncoder, TiffKind, TiffKindStandard};
use tiff::tags::Tag;

/// Compression method for GeoTIFF output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoTiffCompression {
    /// No compression.
    #[default]
    None,
    /// LZW compression.
    Lzw,
    /// Deflate (zlib) compression.
    Deflate,
}

/// File format of a cutout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum OutputFormat {
    /// Float32 GeoTIFF.
    GeoTiff {
        #[serde(default)]
        compression: GeoTiffCompression,
    },
    /// ESRI ASCII grid with a `.prj` sidecar.
    AsciiGrid,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::GeoTiff { compression: GeoTiffCompression::default() }
    }
}

impl OutputFormat {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::GeoTiff { .. } => "tif",
            OutputFormat::AsciiGrid => "asc",
        }
    }

    /// MIME type for serving encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::GeoTiff { .. } => "image/tiff",
            OutputFormat::AsciiGrid => "text/plain",
        }
    }
}

/// Builder for GeoTIFF output.
pub struct GeoTiffWriter<'a> {
    grid: &'a ElevationGrid,
    compression: GeoTiffCompression,
    rows_per_strip: Option<u32>,
}

impl<'a> GeoTiffWriter<'a> {
    #[must_use]
    pub fn new(grid: &'a ElevationGrid) -> Self {
        Self {
            grid,
            compression: GeoTiffCompression::default(),
            rows_per_strip: None,
        }
    }

    #[must_use]
    pub fn compression(mut self, compression: GeoTiffCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Rows per strip; the encoder picks ~8 KB strips when unset.
    #[must_use]
    pub fn rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = Some(rows.max(1));
        self
    }

    /// Write to a file path.
    pub fn write<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write to any seekable writer.
    pub fn write_to<W: Write + Seek>(self, writer: W) -> Result<()> {
        let (width, height) = self.grid.dimensions();
        if width == 0 || height == 0 {
            return Err(DemError::InvalidGrid("cannot encode an empty grid".into()));
        }

        let mut encoder = TiffEncoder::new(writer)?;
        match self.compression {
            GeoTiffCompression::None => self.write_image(
                encoder.new_image_with_compression::<Gray32Float, _>(width, height, Uncompressed)?,
            ),
            GeoTiffCompression::Lzw => self.write_image(
                encoder.new_image_with_compression::<Gray32Float, _>(width, height, Lzw)?,
            ),
            GeoTiffCompression::Deflate => self.write_image(
                encoder.new_image_with_compression::<Gray32Float, _>(
                    width,
                    height,
                    Deflate::with_level(DeflateLevel::Balanced),
                )?,
            ),
        }
    }

    fn write_image<W: Write + Seek, D: Compression>(
        &self,
        mut image: ImageEncoder<'_, W, Gray32Float, TiffKindStandard, D>,
    ) -> Result<()> {
        if let Some(rows) = self.rows_per_strip {
            image.rows_per_strip(rows)?;
        }
        write_geotiff_tags(image.encoder(), self.grid)?;
        image.write_data(self.grid.data())?;
        Ok(())
    }
}

fn write_geotiff_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    grid: &ElevationGrid,
) -> Result<()> {
    let t = grid.transform();
    if t.is_north_up() && t.a > 0.0 && t.e < 0.0 {
        // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
        dir.write_tag(Tag::ModelPixelScaleTag, [t.a, -t.e, 0.0].as_slice())?;
        // ModelTiepoint: pixel (0, 0) to the top-left corner
        dir.write_tag(Tag::ModelTiepointTag, [0.0, 0.0, 0.0, t.c, t.f, 0.0].as_slice())?;
    } else {
        let matrix = [
            t.a, t.b, 0.0, t.c, //
            t.d, t.e, 0.0, t.f, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, matrix.as_slice())?;
    }

    let (directory, doubles, ascii) = GeoKeys::from_projection(grid.projection()).encode();
    dir.write_tag(Tag::GeoKeyDirectoryTag, directory.as_slice())?;
    if !doubles.is_empty() {
        dir.write_tag(Tag::GeoDoubleParamsTag, doubles.as_slice())?;
    }
    if !ascii.is_empty() {
        dir.write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())?;
    }

    if let Some(nodata) = grid.nodata() {
        dir.write_tag(Tag::GdalNodata, nodata.to_string().as_str())?;
    }
    Ok(())
}

/// Render an ESRI ASCII grid.
///
/// The grid must be north-up. Non-square cells use GDAL's `dx`/`dy` header.
pub fn ascii_grid(grid: &ElevationGrid) -> Result<String> {
    let t = grid.transform();
    if !t.is_north_up() || t.a <= 0.0 || t.e >= 0.0 {
        return Err(DemError::InvalidGrid("ASCII grids must be north-up".into()));
    }
    let (width, height) = grid.dimensions();
    let (dx, dy) = (t.a, -t.e);
    let nodata = grid.nodata_or_default();

    let cells = if (dx - dy).abs() <= dx.abs() * 1e-9 {
        format!("cellsize {dx}\n")
    } else {
        format!("dx {dx}\ndy {dy}\n")
    };
    let mut out = format!(
        "ncols {width}\nnrows {height}\nxllcorner {}\nyllcorner {}\n{cells}NODATA_value {nodata}\n",
        t.c,
        t.f - dy * f64::from(height),
    );
    out.reserve(grid.data().len() * 8);

    for row in grid.data().chunks(width as usize) {
        let line: Vec<String> = row
            .iter()
            .map(|&value| (if grid.is_nodata(value) { nodata } else { value }).to_string())
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    Ok(out)
}

impl ElevationGrid {
    /// Encode as an uncompressed GeoTIFF in memory.
    pub fn to_geotiff_bytes(&self) -> Result<Vec<u8>> {
        self.to_geotiff_bytes_compressed(GeoTiffCompression::None)
    }

    /// Encode as a GeoTIFF in memory with compression.
    pub fn to_geotiff_bytes_compressed(&self, compression: GeoTiffCompression) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        GeoTiffWriter::new(self).compression(compression).write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    /// Write a GeoTIFF file.
    pub fn write_geotiff<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        GeoTiffWriter::new(self).write(path)
    }

    /// Encode in `format`, without sidecars.
    pub fn encode(&self, format: &OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::GeoTiff { compression } => self.to_geotiff_bytes_compressed(*compression),
            OutputFormat::AsciiGrid => Ok(ascii_grid(self)?.into_bytes()),
        }
    }

    /// Write in `format` to `path`, returning every file written.
    pub fn write_output<P: AsRef<Path>>(&self, path: P, format: &OutputFormat) -> Result<Vec<PathBuf>> {
        let path = path.as_ref();
        match format {
            OutputFormat::GeoTiff { compression } => {
                GeoTiffWriter::new(self).compression(*compression).write(path)?;
                Ok(vec![path.to_path_buf()])
            }
            OutputFormat::AsciiGrid => {
                std::fs::write(path, ascii_grid(self)?)?;
                let prj = path.with_extension("prj");
                std::fs::write(&prj, format!("{}\n", self.projection().to_proj_string()))?;
                Ok(vec![path.to_path_buf(), prj])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{LocalProjection, MOON_RADIUS_M};
    use crate::{AffineTransform, Projection, RasterSource};

    fn small_grid() -> ElevationGrid {
        let data = vec![1.0, 2.0, 3.0, -32768.0, 5.0, 6.0];
        ElevationGrid::new(
            data,
            3,
            2,
            AffineTransform::from_origin(-300.0, 200.0, 100.0, 100.0),
            LocalProjection::Orthographic.centered_at(-11.36, -43.31, MOON_RADIUS_M),
            Some(-32768.0),
        )
        .unwrap()
    }

    #[test]
    fn test_write_grayscale_geotiff() {
        let bytes = small_grid().to_geotiff_bytes().unwrap();
        // Little-endian TIFF magic
        assert_eq!(&bytes[0..4], &[0x49, 0x49, 0x2a, 0x00]);
    }

    #[test]
    fn test_compressed_output_decodes_to_same_grid() {
        let dir = tempfile::tempdir().unwrap();
        let grid = small_grid();
        for compression in [GeoTiffCompression::Lzw, GeoTiffCompression::Deflate] {
            let path = dir.path().join(format!("{compression:?}.tif"));
            std::fs::write(&path, grid.to_geotiff_bytes_compressed(compression).unwrap()).unwrap();
            let mut source = RasterSource::open(&path).unwrap();
            let full = source.metadata().full_window();
            assert_eq!(source.read_window(&full).unwrap(), grid);
        }
    }

    #[test]
    fn test_rotated_transform_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let grid = ElevationGrid::new(
            vec![0.0; 4],
            2,
            2,
            AffineTransform::new(1.0, 0.5, 10.0, 0.5, -1.0, 20.0),
            Projection::lunar_equirectangular(),
            None,
        )
        .unwrap();
        let path = dir.path().join("rotated.tif");
        grid.write_geotiff(&path).unwrap();
        let source = RasterSource::open(&path).unwrap();
        assert_eq!(&source.metadata().transform, grid.transform());
        assert_eq!(source.metadata().nodata, None);
    }

    #[test]
    fn test_empty_grid_rejected() {
        let grid = ElevationGrid::new(
            vec![],
            0,
            0,
            AffineTransform::from_origin(0.0, 0.0, 1.0, 1.0),
            Projection::lunar_equirectangular(),
            None,
        )
        .unwrap();
        assert!(matches!(grid.to_geotiff_bytes(), Err(DemError::InvalidGrid(_))));
    }

    #[test]
    fn test_ascii_grid() {
        let text = ascii_grid(&small_grid()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ncols 3");
        assert_eq!(lines[1], "nrows 2");
        assert_eq!(lines[2], "xllcorner -300");
        assert_eq!(lines[3], "yllcorner 0");
        assert_eq!(lines[4], "cellsize 100");
        assert_eq!(lines[5], "NODATA_value -32768");
        assert_eq!(lines[6], "1 2 3");
        assert_eq!(lines[7], "-32768 5 6");
    }

    #[test]
    fn test_ascii_grid_rectangular_cells() {
        let grid = ElevationGrid::new(
            vec![1.5, -32768.0],
            2,
            1,
            AffineTransform::from_origin(10.0, 5.0, 0.5, 0.25),
            Projection::Geographic { radius: MOON_RADIUS_M },
            Some(-32768.0),
        )
        .unwrap();
        let text = ascii_grid(&grid).unwrap();
        assert_eq!(
            text,
            "ncols 2\nnrows 1\nxllcorner 10\nyllcorner 4.75\ndx 0.5\ndy 0.25\nNODATA_value -32768\n1.5 -32768\n"
        );
    }

    #[test]
    fn test_ascii_output_writes_prj_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let grid = small_grid();
        let written = grid
            .write_output(dir.path().join("tycho.asc"), &OutputFormat::AsciiGrid)
            .unwrap();
        assert_eq!(written.len(), 2);
        let prj = std::fs::read_to_string(&written[1]).unwrap();
        assert_eq!(
            Projection::from_proj_string(prj.trim()).unwrap(),
            *grid.projection()
        );
    }

    #[test]
    fn test_output_format_serde() {
        let format: OutputFormat =
            serde_yaml::from_str("format: geo_tiff\ncompression: deflate\n").unwrap();
        assert_eq!(format, OutputFormat::GeoTiff { compression: GeoTiffCompression::Deflate });
        let format: OutputFormat = serde_yaml::from_str("format: ascii_grid\n").unwrap();
        assert_eq!(format, OutputFormat::AsciiGrid);
        assert_eq!(format.extension(), "asc");
    }
}
