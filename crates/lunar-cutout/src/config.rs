//! Pipeline configuration loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```yaml
//! raster_path: data/Lunar_LRO_LOLA_Global_LDEM_118m_Mar2014.tif
//! features_path: data/craters.csv
//! value_scale: 0.5
//! default_size_deg: 5.0
//! projection: local-ortho
//! resampling: bilinear
//! width_correction: false
//! output:
//!   format: geo_tiff
//!   compression: deflate
//! ```

use crate::request::ProjectionChoice;
use crate::{CutoutError, Result};
use lunar_dem::{OutputFormat, Projection, Resampling, DEFAULT_MAX_PIXELS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the LOLA global mosaic.
pub const LOLA_FILE_NAME: &str = "Lunar_LRO_LOLA_Global_LDEM_118m_Mar2014.tif";

/// LOLA stores elevation in half-meter units.
pub const LOLA_VALUE_SCALE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CutoutConfig {
    /// GeoTIFF elevation raster.
    pub raster_path: PathBuf,
    /// CSV feature table.
    pub features_path: PathBuf,
    /// PROJ string overriding the raster's own projection tags.
    pub source_projection: Option<String>,
    /// Factor applied to raw samples.
    pub value_scale: f32,
    /// Side length used when a request gives none.
    pub default_size_deg: f64,
    /// Projection used when a request gives none.
    pub projection: ProjectionChoice,
    pub resampling: Resampling,
    /// Widen the longitude extent by 1/cos(latitude) so cutouts are square on the ground.
    pub width_correction: bool,
    pub output: OutputFormat,
    /// Largest warped grid, in pixels.
    pub max_pixels: usize,
}

impl Default for CutoutConfig {
    fn default() -> Self {
        Self {
            raster_path: Path::new("data").join(LOLA_FILE_NAME),
            features_path: PathBuf::from("data/craters.csv"),
            source_projection: None,
            value_scale: LOLA_VALUE_SCALE,
            default_size_deg: 5.0,
            projection: ProjectionChoice::default(),
            resampling: Resampling::default(),
            width_correction: false,
            output: OutputFormat::default(),
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl CutoutConfig {
    /// Load and validate a YAML configuration file.
    ///
    /// Relative paths inside the file are resolved against its directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CutoutError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_yaml_str(&text)
            .map_err(|e| CutoutError::Config(format!("{}: {e}", path.display())))?;
        if let Some(base) = path.parent() {
            config.raster_path = base.join(&config.raster_path);
            config.features_path = base.join(&config.features_path);
        }
        tracing::debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document deserializes as null rather than an empty map
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| CutoutError::Config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if !(self.value_scale.is_finite() && self.value_scale != 0.0) {
            return Err(CutoutError::Config(format!(
                "value_scale must be a non-zero number, got {}",
                self.value_scale
            )));
        }
        if !(self.default_size_deg.is_finite() && self.default_size_deg > 0.0) {
            return Err(CutoutError::Config(format!(
                "default_size_deg must be positive, got {}",
                self.default_size_deg
            )));
        }
        if self.max_pixels == 0 {
            return Err(CutoutError::Config("max_pixels must be positive".into()));
        }
        self.source_projection()?;
        Ok(())
    }

    /// The parsed source projection override.
    pub fn source_projection(&self) -> Result<Option<Projection>> {
        self.source_projection
            .as_deref()
            .map(|definition| {
                Projection::from_proj_string(definition)
                    .map_err(|e| CutoutError::Config(format!("source_projection: {e}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use lunar_dem::GeoTiffCompression;

    #[test]
    fn test_defaults() {
        let config = CutoutConfig::from_yaml_str("").unwrap();
        assert_eq!(config, CutoutConfig::default());
        assert_eq!(config.value_scale, 0.5);
        assert_eq!(config.default_size_deg, 5.0);
        assert_eq!(config.resampling, Resampling::Bilinear);
        assert_eq!(config.projection, ProjectionChoice::LocalOrtho);
    }

    #[test]
    fn test_full_config() {
        let yaml = "\
raster_path: /data/lola.tif
features_path: /data/iau.csv
source_projection: +proj=eqc +R=1737400
value_scale: 1.0
default_size_deg: 2.5
projection: none
resampling: cubic
width_correction: true
output:
  format: geo_tiff
  compression: lzw
";
        let config = CutoutConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.raster_path, PathBuf::from("/data/lola.tif"));
        assert_eq!(config.projection, ProjectionChoice::None);
        assert_eq!(config.resampling, Resampling::Cubic);
        assert!(config.width_correction);
        assert_eq!(config.output, OutputFormat::GeoTiff { compression: GeoTiffCompression::Lzw });
        assert_eq!(config.source_projection().unwrap(), Some(Projection::lunar_equirectangular()));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for yaml in [
            "value_scale: 0",
            "default_size_deg: -1",
            "source_projection: +proj=merc",
            "resampling: lanczos",
            "unknown_key: 1",
        ] {
            let err = CutoutConfig::from_yaml_str(yaml).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{yaml}");
        }
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cutout.yaml");
        std::fs::write(&path, "raster_path: lola.tif\n").unwrap();
        let config = CutoutConfig::load(&path).unwrap();
        assert_eq!(config.raster_path, dir.path().join("lola.tif"));
        assert_eq!(config.features_path, dir.path().join("data/craters.csv"));

        let err = CutoutConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
