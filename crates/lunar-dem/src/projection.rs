//! Map projections on a spherical body.
//!
//! The global LOLA mosaic is stored in a simple cylindrical (equirectangular)
//! projection on a sphere of radius 1737.4 km. Cutouts are re-projected into
//! azimuthal projections centered on the feature so that round craters stay
//! round. All projections here are spherical; the lunar flattening (0.0012)
//! is far below the resolution of the data and is ignored.
//!
//! Longitudes and latitudes are always in degrees. Projected coordinates are
//! in meters, except for [`Projection::Geographic`] where they are degrees.

use crate::{DemError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference radius of the LOLA elevation model, in meters.
pub const MOON_RADIUS_M: f64 = 1_737_400.0;

/// Tolerance used when testing points against a projection's domain.
const DOMAIN_EPSILON: f64 = 1e-9;

/// A projection with its parameters.
///
/// `forward` maps (lon, lat) to projected (x, y); `inverse` maps back. Both
/// return `None` for points outside the projection's domain (e.g. the far
/// hemisphere of an orthographic view).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "proj", rename_all = "snake_case")]
pub enum Projection {
    /// Plain longitude/latitude in degrees.
    Geographic {
        /// Sphere radius in meters (used only for ground distances).
        radius: f64,
    },
    /// Simple cylindrical projection (`+proj=eqc`).
    Equirectangular {
        /// Sphere radius in meters.
        radius: f64,
        /// Latitude of true scale, degrees.
        lat_ts: f64,
        /// Central meridian, degrees.
        lon_0: f64,
    },
    /// Orthographic view from infinity (`+proj=ortho`).
    Orthographic {
        /// Sphere radius in meters.
        radius: f64,
        /// Latitude of the projection center, degrees.
        lat_0: f64,
        /// Longitude of the projection center, degrees.
        lon_0: f64,
    },
    /// Azimuthal equidistant (`+proj=aeqd`).
    AzimuthalEquidistant {
        /// Sphere radius in meters.
        radius: f64,
        /// Latitude of the projection center, degrees.
        lat_0: f64,
        /// Longitude of the projection center, degrees.
        lon_0: f64,
    },
}

/// Family of local projection to center on a cutout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalProjection {
    /// Orthographic, as seen by an observer far above the feature.
    #[default]
    Orthographic,
    /// Azimuthal equidistant, true distances from the center.
    AzimuthalEquidistant,
}

impl LocalProjection {
    /// Instantiate this family centered on (`lon`, `lat`).
    pub fn centered_at(self, lon: f64, lat: f64, radius: f64) -> Projection {
        match self {
            LocalProjection::Orthographic => Projection::Orthographic {
                radius,
                lat_0: lat,
                lon_0: lon,
            },
            LocalProjection::AzimuthalEquidistant => Projection::AzimuthalEquidistant {
                radius,
                lat_0: lat,
                lon_0: lon,
            },
        }
    }
}

impl Projection {
    /// The LOLA global mosaic projection: equirectangular on the lunar sphere.
    pub fn lunar_equirectangular() -> Self {
        Projection::Equirectangular {
            radius: MOON_RADIUS_M,
            lat_ts: 0.0,
            lon_0: 0.0,
        }
    }

    /// Sphere radius in meters.
    pub fn radius(&self) -> f64 {
        match *self {
            Projection::Geographic { radius }
            | Projection::Equirectangular { radius, .. }
            | Projection::Orthographic { radius, .. }
            | Projection::AzimuthalEquidistant { radius, .. } => radius,
        }
    }

    /// Whether projected coordinates are degrees of longitude/latitude.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Projection::Geographic { .. })
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<()> {
        let radius = self.radius();
        if !radius.is_finite() || radius <= 0.0 {
            return Err(DemError::Projection(format!("invalid sphere radius {radius}")));
        }
        let (lat, lon) = match *self {
            Projection::Geographic { .. } => return Ok(()),
            Projection::Equirectangular { lat_ts, lon_0, .. } => {
                if !(lat_ts.abs() < 90.0) {
                    return Err(DemError::Projection(format!(
                        "latitude of true scale must be within (-90, 90), got {lat_ts}"
                    )));
                }
                (lat_ts, lon_0)
            }
            Projection::Orthographic { lat_0, lon_0, .. }
            | Projection::AzimuthalEquidistant { lat_0, lon_0, .. } => (lat_0, lon_0),
        };
        if !(-90.0..=90.0).contains(&lat) {
            return Err(DemError::Projection(format!("center latitude {lat} out of range")));
        }
        if !lon.is_finite() {
            return Err(DemError::Projection(format!("center longitude {lon} is not finite")));
        }
        Ok(())
    }

    /// Project (`lon`, `lat`) in degrees to projected coordinates.
    pub fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 + DOMAIN_EPSILON {
            return None;
        }
        match *self {
            Projection::Geographic { .. } => Some((lon, lat)),
            Projection::Equirectangular { radius, lat_ts, lon_0 } => Some((
                radius * (lon - lon_0).to_radians() * lat_ts.to_radians().cos(),
                radius * lat.to_radians(),
            )),
            Projection::Orthographic { radius, lat_0, lon_0 } => {
                let (phi, phi0, dlam) = (lat.to_radians(), lat_0.to_radians(), (lon - lon_0).to_radians());
                let cos_c = phi0.sin() * phi.sin() + phi0.cos() * phi.cos() * dlam.cos();
                if cos_c < -DOMAIN_EPSILON {
                    return None;
                }
                Some((
                    radius * phi.cos() * dlam.sin(),
                    radius * (phi0.cos() * phi.sin() - phi0.sin() * phi.cos() * dlam.cos()),
                ))
            }
            Projection::AzimuthalEquidistant { radius, lat_0, lon_0 } => {
                let (phi, phi0, dlam) = (lat.to_radians(), lat_0.to_radians(), (lon - lon_0).to_radians());
                let cos_c = (phi0.sin() * phi.sin() + phi0.cos() * phi.cos() * dlam.cos()).clamp(-1.0, 1.0);
                let c = cos_c.acos();
                if (std::f64::consts::PI - c).abs() < 1e-12 {
                    // Antipode maps to a circle, not a point.
                    return None;
                }
                let k = if c.abs() < 1e-12 { 1.0 } else { c / c.sin() };
                Some((
                    radius * k * phi.cos() * dlam.sin(),
                    radius * k * (phi0.cos() * phi.sin() - phi0.sin() * phi.cos() * dlam.cos()),
                ))
            }
        }
    }

    /// Unproject (`x`, `y`) to (lon, lat) in degrees.
    ///
    /// Longitudes are not wrapped: equirectangular coordinates past the
    /// antimeridian come back as longitudes beyond +/-180, and azimuthal
    /// projections return longitudes within 180 degrees of their center.
    pub fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        match *self {
            Projection::Geographic { .. } => {
                if y.abs() > 90.0 + DOMAIN_EPSILON {
                    return None;
                }
                Some((x, y.clamp(-90.0, 90.0)))
            }
            Projection::Equirectangular { radius, lat_ts, lon_0 } => {
                let lat = (y / radius).to_degrees();
                if lat.abs() > 90.0 + DOMAIN_EPSILON {
                    return None;
                }
                let lon = (x / (radius * lat_ts.to_radians().cos())).to_degrees() + lon_0;
                Some((lon, lat.clamp(-90.0, 90.0)))
            }
            Projection::Orthographic { radius, lat_0, lon_0 } => {
                let rho = x.hypot(y);
                if rho > radius * (1.0 + DOMAIN_EPSILON) {
                    return None;
                }
                let c = (rho / radius).min(1.0).asin();
                Some(azimuthal_inverse(x, y, rho, c, lat_0, lon_0))
            }
            Projection::AzimuthalEquidistant { radius, lat_0, lon_0 } => {
                let rho = x.hypot(y);
                let c = rho / radius;
                if c > std::f64::consts::PI {
                    return None;
                }
                Some(azimuthal_inverse(x, y, rho, c, lat_0, lon_0))
            }
        }
    }

    /// PROJ-style definition string.
    pub fn to_proj_string(&self) -> String {
        match *self {
            Projection::Geographic { radius } => format!("+proj=longlat +R={radius} +no_defs"),
            Projection::Equirectangular { radius, lat_ts, lon_0 } => {
                format!("+proj=eqc +lat_ts={lat_ts} +lon_0={lon_0} +R={radius} +units=m +no_defs")
            }
            Projection::Orthographic { radius, lat_0, lon_0 } => {
                format!("+proj=ortho +lat_0={lat_0} +lon_0={lon_0} +R={radius} +units=m +no_defs")
            }
            Projection::AzimuthalEquidistant { radius, lat_0, lon_0 } => {
                format!("+proj=aeqd +lat_0={lat_0} +lon_0={lon_0} +R={radius} +units=m +no_defs")
            }
        }
    }

    /// Parse a PROJ-style definition such as `+proj=eqc +R=1737400`.
    ///
    /// Only the spherical projections above are understood. Missing
    /// parameters default to zero, and a missing radius to [`MOON_RADIUS_M`].
    pub fn from_proj_string(definition: &str) -> Result<Self> {
        let mut proj = None;
        let mut radius = MOON_RADIUS_M;
        let mut lat_0 = 0.0;
        let mut lon_0 = 0.0;
        let mut lat_ts = 0.0;

        for token in definition.split_whitespace() {
            let token = token.trim_start_matches('+');
            let (key, value) = match token.split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            let number = || {
                value.parse::<f64>().map_err(|_| {
                    DemError::Projection(format!("invalid value for +{key}: {value}"))
                })
            };
            match key {
                "proj" => proj = Some(value.to_string()),
                "R" | "a" => radius = number()?,
                "lat_0" => lat_0 = number()?,
                "lon_0" => lon_0 = number()?,
                "lat_ts" => lat_ts = number()?,
                _ => {}
            }
        }

        let projection = match proj.as_deref() {
            Some("longlat") | Some("latlong") | Some("lonlat") | Some("latlon") => {
                Projection::Geographic { radius }
            }
            Some("eqc") => Projection::Equirectangular { radius, lat_ts, lon_0 },
            Some("ortho") => Projection::Orthographic { radius, lat_0, lon_0 },
            Some("aeqd") => Projection::AzimuthalEquidistant { radius, lat_0, lon_0 },
            Some(other) => {
                return Err(DemError::Projection(format!("unsupported projection '{other}'")))
            }
            None => {
                return Err(DemError::Projection(format!(
                    "no +proj parameter in '{definition}'"
                )))
            }
        };
        projection.validate()?;
        Ok(projection)
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_proj_string())
    }
}

/// Shared inverse for azimuthal projections, given the angular distance `c`.
fn azimuthal_inverse(x: f64, y: f64, rho: f64, c: f64, lat_0: f64, lon_0: f64) -> (f64, f64) {
    if rho < 1e-12 {
        return (lon_0, lat_0);
    }
    let phi0 = lat_0.to_radians();
    let (sin_c, cos_c) = c.sin_cos();
    let phi = (cos_c * phi0.sin() + y * sin_c * phi0.cos() / rho).clamp(-1.0, 1.0).asin();
    let lam = (x * sin_c).atan2(rho * phi0.cos() * cos_c - y * phi0.sin() * sin_c);
    (lon_0 + lam.to_degrees(), phi.to_degrees())
}

/// Wrap a longitude into [-180, 180).
pub fn normalize_lon(lon: f64) -> f64 {
    if (-180.0..180.0).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Shift `lon` by whole turns so it lies within 180 degrees of `reference`.
pub fn unwrap_lon(lon: f64, reference: f64) -> f64 {
    reference + normalize_lon(lon - reference)
}
