//! What to cut out.

use lunar_dem::{LocalProjection, OutputFormat, Resampling, TargetProjection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The center of a cutout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoutTarget {
    /// A feature looked up in the catalog.
    Feature(String),
    /// Explicit coordinates, with an optional diameter for diameter-based sizing.
    Coordinates {
        lon: f64,
        lat: f64,
        #[serde(default)]
        diameter_km: Option<f64>,
    },
}

/// Side length of the cutout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeSpec {
    /// Degrees of latitude (and longitude) on each side.
    Degrees(f64),
    /// Multiples of the feature's diameter.
    Diameters(f64),
}

/// Projection of the cutout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectionChoice {
    /// Orthographic centered on the cutout.
    #[default]
    LocalOrtho,
    /// Azimuthal equidistant centered on the cutout.
    LocalAeqd,
    /// Keep the raster's own projection.
    None,
}

impl ProjectionChoice {
    /// Warp target, or `None` to pass the window through.
    pub fn target(self) -> Option<TargetProjection> {
        match self {
            ProjectionChoice::LocalOrtho => Some(TargetProjection::Local(LocalProjection::Orthographic)),
            ProjectionChoice::LocalAeqd => {
                Some(TargetProjection::Local(LocalProjection::AzimuthalEquidistant))
            }
            ProjectionChoice::None => None,
        }
    }
}

impl fmt::Display for ProjectionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProjectionChoice::LocalOrtho => "local-ortho",
            ProjectionChoice::LocalAeqd => "local-aeqd",
            ProjectionChoice::None => "none",
        })
    }
}

impl FromStr for ProjectionChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local-ortho" | "ortho" => Ok(ProjectionChoice::LocalOrtho),
            "local-aeqd" | "aeqd" => Ok(ProjectionChoice::LocalAeqd),
            "none" | "source" => Ok(ProjectionChoice::None),
            other => Err(format!("unknown projection '{other}' (expected local-ortho, local-aeqd or none)")),
        }
    }
}

/// One cutout. Unset options fall back to the pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoutRequest {
    pub target: CutoutTarget,
    #[serde(default)]
    pub size: Option<SizeSpec>,
    #[serde(default)]
    pub projection: Option<ProjectionChoice>,
    #[serde(default)]
    pub resampling: Option<Resampling>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    /// Block-mean downsampling factor applied to the final grid.
    #[serde(default)]
    pub downsample: Option<u32>,
}

impl CutoutRequest {
    /// Cut out around a named feature.
    pub fn feature(name: impl Into<String>) -> Self {
        Self::new(CutoutTarget::Feature(name.into()))
    }

    /// Cut out around explicit coordinates.
    pub fn coordinates(lon: f64, lat: f64) -> Self {
        Self::new(CutoutTarget::Coordinates { lon, lat, diameter_km: None })
    }

    fn new(target: CutoutTarget) -> Self {
        Self {
            target,
            size: None,
            projection: None,
            resampling: None,
            format: None,
            downsample: None,
        }
    }

    #[must_use]
    pub fn size(mut self, size: SizeSpec) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn projection(mut self, projection: ProjectionChoice) -> Self {
        self.projection = Some(projection);
        self
    }

    #[must_use]
    pub fn resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = Some(resampling);
        self
    }

    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn downsample(mut self, factor: u32) -> Self {
        self.downsample = Some(factor);
        self
    }

    /// Diameter to use with [`SizeSpec::Diameters`] for coordinate targets.
    #[must_use]
    pub fn diameter_km(mut self, diameter: f64) -> Self {
        if let CutoutTarget::Coordinates { diameter_km, .. } = &mut self.target {
            *diameter_km = Some(diameter);
        }
        self
    }

    /// File stem for output derived from the target.
    pub fn output_stem(&self) -> String {
        match &self.target {
            CutoutTarget::Feature(name) => name
                .trim()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
                .collect(),
            CutoutTarget::Coordinates { lon, lat, .. } => format!("cutout_{lon:.2}_{lat:.2}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_choice_parse() {
        assert_eq!("local-ortho".parse(), Ok(ProjectionChoice::LocalOrtho));
        assert_eq!("AEQD".parse(), Ok(ProjectionChoice::LocalAeqd));
        assert_eq!("none".parse(), Ok(ProjectionChoice::None));
        assert!("mercator".parse::<ProjectionChoice>().is_err());
        assert_eq!(ProjectionChoice::None.target(), None);
    }

    #[test]
    fn test_builder_and_output_stem() {
        let request = CutoutRequest::feature("Mons Hadley Delta")
            .size(SizeSpec::Diameters(3.0))
            .projection(ProjectionChoice::LocalAeqd);
        assert_eq!(request.size, Some(SizeSpec::Diameters(3.0)));
        assert_eq!(request.output_stem(), "mons_hadley_delta");

        let request = CutoutRequest::coordinates(-11.36, -43.31).diameter_km(85.0);
        assert_eq!(
            request.target,
            CutoutTarget::Coordinates { lon: -11.36, lat: -43.31, diameter_km: Some(85.0) }
        );
        assert_eq!(request.output_stem(), "cutout_-11.36_-43.31");
    }

    #[test]
    fn test_request_from_json() {
        let request: CutoutRequest = serde_json::from_str(
            r#"{"target": {"feature": "Tycho"}, "size": {"degrees": 5.0}, "projection": "local-ortho"}"#,
        )
        .unwrap();
        assert_eq!(request.target, CutoutTarget::Feature("Tycho".into()));
        assert_eq!(request.size, Some(SizeSpec::Degrees(5.0)));
        assert_eq!(request.projection, Some(ProjectionChoice::LocalOrtho));
        assert_eq!(request.format, None);
    }
}
