//! GeoTIFF GeoKey directory encoding and decoding.
//!
//! The GeoKeyDirectory tag holds a header and 4-word entries
//! `[KeyID, TIFFTagLocation, Count, Value_Offset]`. A location of 0 stores a
//! SHORT inline; otherwise the value lives in the GeoDoubleParams or
//! GeoAsciiParams tag at the given offset. Lunar rasters use user-defined
//! coordinate systems, so the projection is described by its coordinate
//! transformation code and parameters plus a PROJ citation string.

use crate::projection::{Projection, MOON_RADIUS_M};
use crate::{DemError, Result};
use std::collections::BTreeMap;

// TIFF tags holding GeoKey payloads
pub const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
pub const GEO_DOUBLE_PARAMS_TAG: u16 = 34736;
pub const GEO_ASCII_PARAMS_TAG: u16 = 34737;

// GeoKey IDs
pub const GT_MODEL_TYPE: u16 = 1024;
pub const GT_RASTER_TYPE: u16 = 1025;
pub const GT_CITATION: u16 = 1026;
pub const GEOGRAPHIC_TYPE: u16 = 2048;
pub const GEOG_CITATION: u16 = 2049;
pub const GEOG_ANGULAR_UNITS: u16 = 2054;
pub const GEOG_SEMI_MAJOR_AXIS: u16 = 2057;
pub const GEOG_SEMI_MINOR_AXIS: u16 = 2058;
pub const PROJECTED_CS_TYPE: u16 = 3072;
pub const PCS_CITATION: u16 = 3073;
pub const PROJECTION: u16 = 3074;
pub const PROJ_COORD_TRANS: u16 = 3075;
pub const PROJ_LINEAR_UNITS: u16 = 3076;
pub const PROJ_STD_PARALLEL_1: u16 = 3078;
pub const PROJ_NAT_ORIGIN_LONG: u16 = 3080;
pub const PROJ_NAT_ORIGIN_LAT: u16 = 3081;
pub const PROJ_FALSE_EASTING: u16 = 3082;
pub const PROJ_FALSE_NORTHING: u16 = 3083;
pub const PROJ_CENTER_LONG: u16 = 3088;
pub const PROJ_CENTER_LAT: u16 = 3089;

// GeoKey values
pub const MODEL_TYPE_PROJECTED: u16 = 1;
pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
pub const RASTER_PIXEL_IS_AREA: u16 = 1;
pub const USER_DEFINED: u16 = 32767;
pub const CT_AZIMUTHAL_EQUIDISTANT: u16 = 12;
pub const CT_EQUIRECTANGULAR: u16 = 17;
pub const CT_ORTHOGRAPHIC: u16 = 21;
pub const LINEAR_METER: u16 = 9001;
pub const ANGULAR_DEGREE: u16 = 9102;

/// A decoded GeoKey value.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoKeyValue {
    Short(u16),
    Doubles(Vec<f64>),
    Ascii(String),
}

/// The set of GeoKeys of one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoKeys {
    entries: BTreeMap<u16, GeoKeyValue>,
}

impl GeoKeys {
    /// Decode the three GeoTIFF tags into keys.
    pub fn parse(directory: &[u16], doubles: &[f64], ascii: &str) -> Result<Self> {
        if directory.len() < 4 {
            return Err(DemError::InvalidGeoTiff("GeoKeyDirectory header is truncated".into()));
        }
        let count = directory[3] as usize;
        if directory.len() < 4 + count * 4 {
            return Err(DemError::InvalidGeoTiff(format!(
                "GeoKeyDirectory declares {count} keys but holds {} words",
                directory.len()
            )));
        }

        let mut entries = BTreeMap::new();
        for entry in directory[4..4 + count * 4].chunks_exact(4) {
            let (key, location, n, offset) = (entry[0], entry[1], entry[2] as usize, entry[3] as usize);
            let value = match location {
                0 => GeoKeyValue::Short(entry[3]),
                GEO_DOUBLE_PARAMS_TAG => match doubles.get(offset..offset + n) {
                    Some(values) => GeoKeyValue::Doubles(values.to_vec()),
                    None => {
                        return Err(DemError::InvalidGeoTiff(format!(
                            "GeoKey {key} points past GeoDoubleParams"
                        )))
                    }
                },
                GEO_ASCII_PARAMS_TAG => match ascii.get(offset..offset + n) {
                    Some(text) => GeoKeyValue::Ascii(
                        text.trim_end_matches(['|', '\0']).to_string(),
                    ),
                    None => {
                        return Err(DemError::InvalidGeoTiff(format!(
                            "GeoKey {key} points past GeoAsciiParams"
                        )))
                    }
                },
                other => {
                    tracing::debug!(key, location = other, "skipping GeoKey stored in an unsupported tag");
                    continue;
                }
            };
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    pub fn short(&self, key: u16) -> Option<u16> {
        match self.entries.get(&key) {
            Some(GeoKeyValue::Short(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn double(&self, key: u16) -> Option<f64> {
        match self.entries.get(&key) {
            Some(GeoKeyValue::Doubles(v)) => v.first().copied(),
            _ => None,
        }
    }

    pub fn ascii(&self, key: u16) -> Option<&str> {
        match self.entries.get(&key) {
            Some(GeoKeyValue::Ascii(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn set_short(&mut self, key: u16, value: u16) {
        self.entries.insert(key, GeoKeyValue::Short(value));
    }

    pub fn set_double(&mut self, key: u16, value: f64) {
        self.entries.insert(key, GeoKeyValue::Doubles(vec![value]));
    }

    pub fn set_ascii(&mut self, key: u16, value: impl Into<String>) {
        self.entries.insert(key, GeoKeyValue::Ascii(value.into()));
    }

    /// Encode into (GeoKeyDirectory, GeoDoubleParams, GeoAsciiParams).
    pub fn encode(&self) -> (Vec<u16>, Vec<f64>, String) {
        let mut directory = vec![1, 1, 0, self.entries.len() as u16];
        let mut doubles = Vec::new();
        let mut ascii = String::new();

        for (&key, value) in &self.entries {
            match value {
                GeoKeyValue::Short(v) => directory.extend_from_slice(&[key, 0, 1, *v]),
                GeoKeyValue::Doubles(values) => {
                    directory.extend_from_slice(&[
                        key,
                        GEO_DOUBLE_PARAMS_TAG,
                        values.len() as u16,
                        doubles.len() as u16,
                    ]);
                    doubles.extend_from_slice(values);
                }
                GeoKeyValue::Ascii(text) => {
                    directory.extend_from_slice(&[
                        key,
                        GEO_ASCII_PARAMS_TAG,
                        (text.len() + 1) as u16,
                        ascii.len() as u16,
                    ]);
                    ascii.push_str(text);
                    ascii.push('|');
                }
            }
        }
        (directory, doubles, ascii)
    }

    /// Keys describing `projection` as a user-defined coordinate system.
    pub fn from_projection(projection: &Projection) -> Self {
        let mut keys = GeoKeys::default();
        let radius = projection.radius();
        keys.set_short(GT_RASTER_TYPE, RASTER_PIXEL_IS_AREA);
        keys.set_ascii(GT_CITATION, projection.to_proj_string());
        keys.set_short(GEOGRAPHIC_TYPE, USER_DEFINED);
        keys.set_short(GEOG_ANGULAR_UNITS, ANGULAR_DEGREE);
        keys.set_double(GEOG_SEMI_MAJOR_AXIS, radius);
        keys.set_double(GEOG_SEMI_MINOR_AXIS, radius);

        let (code, center_lat, center_lon) = match *projection {
            Projection::Geographic { .. } => {
                keys.set_short(GT_MODEL_TYPE, MODEL_TYPE_GEOGRAPHIC);
                return keys;
            }
            Projection::Equirectangular { lat_ts, lon_0, .. } => {
                keys.set_double(PROJ_STD_PARALLEL_1, lat_ts);
                (CT_EQUIRECTANGULAR, 0.0, lon_0)
            }
            Projection::Orthographic { lat_0, lon_0, .. } => (CT_ORTHOGRAPHIC, lat_0, lon_0),
            Projection::AzimuthalEquidistant { lat_0, lon_0, .. } => {
                (CT_AZIMUTHAL_EQUIDISTANT, lat_0, lon_0)
            }
        };
        keys.set_short(GT_MODEL_TYPE, MODEL_TYPE_PROJECTED);
        keys.set_short(PROJECTED_CS_TYPE, USER_DEFINED);
        keys.set_short(PROJECTION, USER_DEFINED);
        keys.set_short(PROJ_COORD_TRANS, code);
        keys.set_short(PROJ_LINEAR_UNITS, LINEAR_METER);
        keys.set_double(PROJ_CENTER_LAT, center_lat);
        keys.set_double(PROJ_CENTER_LONG, center_lon);
        keys.set_double(PROJ_FALSE_EASTING, 0.0);
        keys.set_double(PROJ_FALSE_NORTHING, 0.0);
        keys
    }

    /// Recover the projection these keys describe.
    ///
    /// A PROJ string in a citation key wins; otherwise the model type and
    /// coordinate transformation code are interpreted.
    pub fn to_projection(&self) -> Result<Projection> {
        for key in [GT_CITATION, PCS_CITATION, GEOG_CITATION] {
            if let Some(start) = self.ascii(key).and_then(|s| s.find("+proj=").map(|i| &s[i..])) {
                return Projection::from_proj_string(start);
            }
        }

        let radius = self.double(GEOG_SEMI_MAJOR_AXIS).unwrap_or(MOON_RADIUS_M);
        let center_lon = self
            .double(PROJ_CENTER_LONG)
            .or_else(|| self.double(PROJ_NAT_ORIGIN_LONG))
            .unwrap_or(0.0);
        let center_lat = self
            .double(PROJ_CENTER_LAT)
            .or_else(|| self.double(PROJ_NAT_ORIGIN_LAT))
            .unwrap_or(0.0);

        let projection = match self.short(GT_MODEL_TYPE) {
            Some(MODEL_TYPE_GEOGRAPHIC) => Projection::Geographic { radius },
            Some(MODEL_TYPE_PROJECTED) => match self.short(PROJ_COORD_TRANS) {
                Some(CT_EQUIRECTANGULAR) => Projection::Equirectangular {
                    radius,
                    lat_ts: self.double(PROJ_STD_PARALLEL_1).unwrap_or(0.0),
                    lon_0: center_lon,
                },
                Some(CT_ORTHOGRAPHIC) => Projection::Orthographic {
                    radius,
                    lat_0: center_lat,
                    lon_0: center_lon,
                },
                Some(CT_AZIMUTHAL_EQUIDISTANT) => Projection::AzimuthalEquidistant {
                    radius,
                    lat_0: center_lat,
                    lon_0: center_lon,
                },
                other => {
                    return Err(DemError::InvalidGeoTiff(format!(
                        "unsupported coordinate transformation {other:?}"
                    )))
                }
            },
            other => {
                return Err(DemError::InvalidGeoTiff(format!("unsupported model type {other:?}")))
            }
        };
        projection.validate()?;
        Ok(projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::LocalProjection;

    #[test]
    fn test_encode_parse_preserves_keys() {
        let keys = GeoKeys::from_projection(&Projection::lunar_equirectangular());
        let (directory, doubles, ascii) = keys.encode();
        assert_eq!(&directory[..4], &[1, 1, 0, directory[3]]);
        assert_eq!(directory.len(), 4 + 4 * directory[3] as usize);
        assert!(ascii.ends_with('|'));

        let parsed = GeoKeys::parse(&directory, &doubles, &ascii).unwrap();
        assert_eq!(parsed, keys);
    }

    #[test]
    fn test_projection_from_citation() {
        let ortho = LocalProjection::Orthographic.centered_at(-11.36, -43.31, MOON_RADIUS_M);
        let keys = GeoKeys::from_projection(&ortho);
        assert_eq!(keys.to_projection().unwrap(), ortho);
    }

    #[test]
    fn test_projection_from_gdal_style_keys() {
        // What GDAL writes for the LOLA mosaic: no PROJ citation, just parameters
        let mut keys = GeoKeys::default();
        keys.set_short(GT_MODEL_TYPE, MODEL_TYPE_PROJECTED);
        keys.set_short(PROJ_COORD_TRANS, CT_EQUIRECTANGULAR);
        keys.set_ascii(GT_CITATION, "SimpleCylindrical Moon");
        keys.set_double(GEOG_SEMI_MAJOR_AXIS, 1_737_400.0);
        keys.set_double(PROJ_STD_PARALLEL_1, 0.0);
        keys.set_double(PROJ_NAT_ORIGIN_LONG, 0.0);

        assert_eq!(keys.to_projection().unwrap(), Projection::lunar_equirectangular());
    }

    #[test]
    fn test_geographic_keys() {
        let mut keys = GeoKeys::default();
        keys.set_short(GT_MODEL_TYPE, MODEL_TYPE_GEOGRAPHIC);
        assert_eq!(
            keys.to_projection().unwrap(),
            Projection::Geographic { radius: MOON_RADIUS_M }
        );
    }

    #[test]
    fn test_unsupported_transform() {
        let mut keys = GeoKeys::default();
        keys.set_short(GT_MODEL_TYPE, MODEL_TYPE_PROJECTED);
        keys.set_short(PROJ_COORD_TRANS, 7);
        assert!(matches!(keys.to_projection(), Err(DemError::InvalidGeoTiff(_))));
        assert!(GeoKeys::default().to_projection().is_err());
    }

    #[test]
    fn test_truncated_directory() {
        assert!(GeoKeys::parse(&[1, 1, 0], &[], "").is_err());
        assert!(GeoKeys::parse(&[1, 1, 0, 2, 1024, 0, 1, 1], &[], "").is_err());
        // Double key pointing past the params array
        assert!(GeoKeys::parse(&[1, 1, 0, 1, 2057, GEO_DOUBLE_PARAMS_TAG, 1, 3], &[1.0], "").is_err());
    }
}
