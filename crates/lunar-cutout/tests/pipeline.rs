//! End-to-end cutouts against synthetic rasters and a small feature table.

use approx::assert_relative_eq;
use lunar_cutout::{
    CutoutConfig, CutoutPipeline, CutoutRequest, ErrorKind, ProjectionChoice, SizeSpec,
};
use lunar_dem::testdata::{self, SyntheticRaster};
use lunar_dem::{GeoTiffCompression, OutputFormat, Projection, RasterSource};
use lunar_features::FeatureCatalog;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const CRATERS: &str = "\
Feature_Name,Feature_Type,Diameter,Center_Latitude,Center_Longitude
Tycho,\"Crater, craters\",85.29,-43.31,-11.36
Shackleton,\"Crater, craters\",21,-89.67,129.78
Daedalus,\"Crater, craters\",93,-5.92,179.4
Nameless Pit,Pit,0,10.0,10.0
";

struct Fixture {
    dir: TempDir,
    config: CutoutConfig,
}

/// A 0.25 degree equirectangular raster and the craters above.
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let raster = SyntheticRaster::lunar_eqc(1440, 720);
    let raster_path = testdata::write_raster(dir.path(), &raster).unwrap();
    let features_path = dir.path().join("craters.csv");
    std::fs::write(&features_path, CRATERS).unwrap();
    let config = CutoutConfig {
        raster_path,
        features_path,
        value_scale: 1.0,
        ..CutoutConfig::default()
    };
    Fixture { dir, config }
}

fn pipeline(config: &CutoutConfig) -> CutoutPipeline {
    let catalog = FeatureCatalog::from_path(&config.features_path).unwrap();
    let source = RasterSource::open(&config.raster_path)
        .unwrap()
        .with_value_scale(config.value_scale);
    CutoutPipeline::new(Arc::new(catalog), source, config.clone())
}

fn raster_value(col: u32, row: u32) -> f32 {
    SyntheticRaster::lunar_eqc(1440, 720).value_at(col, row)
}

#[test]
fn test_tycho_local_ortho_cutout() {
    let fx = fixture();
    let mut pipeline = pipeline(&fx.config);

    let grid = pipeline.cutout(&CutoutRequest::feature("tycho")).unwrap();
    let Projection::Orthographic { lat_0, lon_0, .. } = *grid.projection() else {
        panic!("expected an orthographic cutout, got {}", grid.projection());
    };
    assert_relative_eq!(lon_0, -11.36, epsilon = 0.2);
    assert_relative_eq!(lat_0, -43.31, epsilon = 0.2);
    assert_eq!(pipeline.source().reads(), 1);

    // 5 degrees at 0.25 degrees per pixel, roughly preserved by the warp
    let (width, height) = grid.dimensions();
    assert!((15..=30).contains(&width), "width {width}");
    assert!((15..=30).contains(&height), "height {height}");
    let stats = grid.stats().unwrap();
    assert!(stats.valid_count > 0);
}

#[test]
fn test_unknown_feature_reads_nothing() {
    let fx = fixture();
    let mut pipeline = pipeline(&fx.config);

    let err = pipeline.cutout(&CutoutRequest::feature("notacrater")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.kind().exit_code(), 2);
    assert_eq!(pipeline.source().reads(), 0);
}

#[test]
fn test_source_projection_window_values() {
    let fx = fixture();
    let mut pipeline = pipeline(&fx.config);
    let request = CutoutRequest::coordinates(0.0, 0.0)
        .size(SizeSpec::Degrees(1.0))
        .projection(ProjectionChoice::None);

    let grid = pipeline.cutout(&request).unwrap();
    // -0.5..0.5 degrees is columns 718..722 and rows 358..362
    assert_eq!(grid.dimensions(), (4, 4));
    assert_eq!(grid.get(0, 0), Some(raster_value(718, 358)));
    assert_eq!(grid.get(3, 3), Some(raster_value(721, 361)));
}

#[test]
fn test_antimeridian_cutout_is_stitched() {
    let fx = fixture();
    let mut pipeline = pipeline(&fx.config);
    let request = CutoutRequest::feature("Daedalus").projection(ProjectionChoice::None);

    let region = pipeline.region(&request).unwrap();
    assert!(region.is_split());

    let grid = pipeline.cutout(&request).unwrap();
    // 176.9..180 is columns 1427..1440, -180..-178.1 is columns 0..8
    assert_eq!(grid.dimensions(), (21, 21));
    assert_eq!(pipeline.source().reads(), 2);
    assert_eq!(grid.get(0, 0), Some(raster_value(1427, 373)));
    assert_eq!(grid.get(12, 0), Some(raster_value(1439, 373)));
    assert_eq!(grid.get(13, 0), Some(raster_value(0, 373)));

    // The warped cutout is continuous across the seam
    let warped = pipeline.cutout(&CutoutRequest::feature("Daedalus")).unwrap();
    let Projection::Orthographic { lon_0, .. } = *warped.projection() else {
        panic!("expected an orthographic cutout");
    };
    assert!(lon_0 > 178.0 || lon_0 < -178.0, "center longitude {lon_0}");
    assert!(warped.stats().unwrap().valid_count > 0);
}

#[test]
fn test_antimeridian_cutout_west_of_seam() {
    let fx = fixture();
    let mut pipeline = pipeline(&fx.config);
    let request = CutoutRequest::coordinates(-179.4, -5.92).size(SizeSpec::Degrees(5.0));

    let unwarped = pipeline.cutout(&request.clone().projection(ProjectionChoice::None)).unwrap();
    let valid = unwarped.stats().unwrap().valid_count;

    let warped = pipeline.cutout(&request).unwrap();
    let Projection::Orthographic { lon_0, .. } = *warped.projection() else {
        panic!("expected an orthographic cutout");
    };
    assert!(lon_0 > 178.0 || lon_0 < -178.0, "center longitude {lon_0}");
    let stats = warped.stats().expect("warped cutout holds valid samples");
    assert!(stats.valid_count * 2 > valid, "{} of {valid} samples", stats.valid_count);
    let (width, height) = warped.dimensions();
    let center = warped.get(width / 2, height / 2).unwrap();
    assert!(!warped.is_nodata(center));
}

#[test]
fn test_polar_cutout_is_truncated() {
    let fx = fixture();
    let mut pipeline = pipeline(&fx.config);
    let request = CutoutRequest::feature("Shackleton").projection(ProjectionChoice::None);

    let bbox = pipeline.region(&request).unwrap().unwrapped();
    assert_eq!(bbox.lat_min, -90.0);
    assert_relative_eq!(bbox.lat_max, -87.17, epsilon = 1e-9);

    let grid = pipeline.cutout(&request).unwrap();
    assert_eq!(grid.dimensions(), (21, 12));
    // The bottom raster row is nodata
    assert!(grid.is_nodata(grid.get(0, 11).unwrap()));

    let warped = pipeline
        .cutout(&CutoutRequest::feature("Shackleton").projection(ProjectionChoice::LocalAeqd))
        .unwrap();
    assert!(matches!(warped.projection(), Projection::AzimuthalEquidistant { .. }));
}

#[test]
fn test_downsampled_cutout() {
    let fx = fixture();
    let mut pipeline = pipeline(&fx.config);
    let request = CutoutRequest::coordinates(0.0, 0.0)
        .size(SizeSpec::Degrees(1.0))
        .projection(ProjectionChoice::None)
        .downsample(2);

    let grid = pipeline.cutout(&request).unwrap();
    assert_eq!(grid.dimensions(), (2, 2));
    let block = [(718, 358), (719, 358), (718, 359), (719, 359)];
    let mean = block.iter().map(|&(c, r)| raster_value(c, r)).sum::<f32>() / 4.0;
    assert_relative_eq!(grid.get(0, 0).unwrap(), mean);
}

#[test]
fn test_diameter_sizing() {
    let fx = fixture();
    let pipeline = pipeline(&fx.config);

    // Two diameters of Tycho: 170.58 km on a 1737.4 km sphere
    let request = CutoutRequest::feature("Tycho").size(SizeSpec::Diameters(2.0));
    let bbox = pipeline.region(&request).unwrap().unwrapped();
    let expected = (170.58 / 1737.4f64).to_degrees();
    assert_relative_eq!(bbox.height_deg(), expected, epsilon = 1e-6);
    assert_relative_eq!(bbox.width_deg(), expected, epsilon = 1e-6);

    let request = CutoutRequest::coordinates(0.0, 0.0)
        .diameter_km(85.29)
        .size(SizeSpec::Diameters(2.0));
    let bbox = pipeline.region(&request).unwrap().unwrapped();
    assert_relative_eq!(bbox.height_deg(), expected, epsilon = 1e-6);

    for request in [
        CutoutRequest::feature("Nameless Pit").size(SizeSpec::Diameters(2.0)),
        CutoutRequest::coordinates(0.0, 0.0).size(SizeSpec::Diameters(2.0)),
    ] {
        let err = pipeline.region(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRegion);
    }
}

#[test]
fn test_width_correction() {
    let mut fx = fixture();
    fx.config.width_correction = true;
    let pipeline = pipeline(&fx.config);

    let bbox = pipeline.region(&CutoutRequest::feature("Tycho")).unwrap().unwrapped();
    assert_relative_eq!(bbox.height_deg(), 5.0, epsilon = 1e-9);
    assert_relative_eq!(bbox.width_deg(), 5.0 / (-43.31f64).to_radians().cos(), epsilon = 1e-9);
}

#[test]
fn test_invalid_sizes_are_rejected() {
    let fx = fixture();
    let mut pipeline = pipeline(&fx.config);
    for deg in [0.0, -2.0, f64::NAN] {
        let err = pipeline
            .cutout(&CutoutRequest::feature("Tycho").size(SizeSpec::Degrees(deg)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRegion);
    }
    let err = pipeline.cutout(&CutoutRequest::coordinates(0.0, 95.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedRegion);
    assert_eq!(pipeline.source().reads(), 0);
}

#[test]
fn test_outside_raster_is_out_of_bounds() {
    let dir = tempfile::tempdir().unwrap();
    // Eastern hemisphere only
    let mut raster = SyntheticRaster::geographic(360, 360);
    raster.transform = lunar_dem::AffineTransform::from_origin(0.0, 90.0, 0.5, 0.5);
    let raster_path = testdata::write_raster(dir.path(), &raster).unwrap();
    let features_path = dir.path().join("craters.csv");
    std::fs::write(&features_path, CRATERS).unwrap();
    let config = CutoutConfig { raster_path, features_path, ..CutoutConfig::default() };
    let mut pipeline = pipeline(&config);

    let err = pipeline.cutout(&CutoutRequest::feature("Tycho")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfBounds);
    assert_eq!(err.kind().exit_code(), 2);
}

#[test]
fn test_max_pixels_limits_warp() {
    let mut fx = fixture();
    fx.config.max_pixels = 10;
    let mut pipeline = pipeline(&fx.config);

    let err = pipeline.cutout(&CutoutRequest::feature("Tycho")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedRegion);

    // Unwarped cutouts are not limited
    let grid = pipeline
        .cutout(&CutoutRequest::feature("Tycho").projection(ProjectionChoice::None))
        .unwrap();
    assert!(grid.data().len() > 10);
}

#[test]
fn test_workers_share_catalog() {
    let fx = fixture();
    let pipeline = pipeline(&fx.config);

    let handles: Vec<_> = ["Tycho", "Daedalus", "Shackleton"]
        .into_iter()
        .map(|name| {
            let mut worker = pipeline.worker().unwrap();
            std::thread::spawn(move || {
                let grid = worker.cutout(&CutoutRequest::feature(name)).unwrap();
                (worker.source().reads(), grid.dimensions())
            })
        })
        .collect();
    for handle in handles {
        let (reads, (width, height)) = handle.join().unwrap();
        assert!(reads >= 1);
        assert!(width > 0 && height > 0);
    }
    // The original handle was never used
    assert_eq!(pipeline.source().reads(), 0);
}

#[test]
fn test_cutout_to_file_and_bytes() {
    let fx = fixture();
    let mut pipeline = pipeline(&fx.config);

    let out = fx.dir.path().join("tycho.tif");
    let request = CutoutRequest::feature("Tycho").format(OutputFormat::GeoTiff {
        compression: GeoTiffCompression::Lzw,
    });
    let written = pipeline.cutout_to_file(&request, &out).unwrap();
    assert_eq!(written, vec![out.clone()]);
    let reopened = RasterSource::open(&out).unwrap();
    assert!(matches!(reopened.metadata().projection, Projection::Orthographic { .. }));

    let request = CutoutRequest::feature("Tycho").format(OutputFormat::AsciiGrid);
    let out = fx.dir.path().join("tycho.asc");
    let written = pipeline.cutout_to_file(&request, &out).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[1].extension().and_then(|e| e.to_str()), Some("prj"));
    let prj = std::fs::read_to_string(&written[1]).unwrap();
    assert!(prj.contains("+proj=ortho"), "{prj}");

    let bytes = pipeline.cutout_to_bytes(&request).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("ncols"), "{text}");
}

#[test]
fn test_from_config_file() {
    let fx = fixture();
    let config_path = fx.dir.path().join("cutout.yaml");
    let raster_name = fx.config.raster_path.file_name().unwrap().to_str().unwrap().to_string();
    std::fs::write(
        &config_path,
        format!("raster_path: {raster_name}\nfeatures_path: craters.csv\nprojection: none\n"),
    )
    .unwrap();

    let config = CutoutConfig::load(&config_path).unwrap();
    let mut pipeline = CutoutPipeline::from_config(config).unwrap();
    assert_eq!(pipeline.catalog().len(), 4);
    assert_eq!(pipeline.source().value_scale(), 0.5);
    let grid = pipeline
        .cutout(&CutoutRequest::coordinates(0.0, 0.0).size(SizeSpec::Degrees(1.0)))
        .unwrap();
    assert_eq!(grid.get(0, 0), Some(raster_value(718, 358) * 0.5));
}

#[test]
fn test_missing_inputs() {
    let fx = fixture();

    let config = CutoutConfig {
        raster_path: Path::new("/nonexistent/lola.tif").to_path_buf(),
        ..fx.config.clone()
    };
    let err = CutoutPipeline::from_config(config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.to_string().contains("download"), "{err}");

    let config = CutoutConfig {
        features_path: fx.dir.path().join("missing.csv"),
        ..fx.config.clone()
    };
    let err = CutoutPipeline::from_config(config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CatalogLoad);
    assert_eq!(err.kind().exit_code(), 3);
}
