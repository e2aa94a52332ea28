//! Feature table loading and lookup.

use crate::{FeatureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Header spellings accepted for each required column (compared lowercased).
const NAME_COLUMNS: &[&str] = &["feature_name", "name", "clean_feature_name"];
const LONGITUDE_COLUMNS: &[&str] = &["center_longitude", "longitude", "lon"];
const LATITUDE_COLUMNS: &[&str] = &["center_latitude", "latitude", "lat"];
const DIAMETER_COLUMNS: &[&str] = &["diameter", "diameter_km"];
const TYPE_COLUMNS: &[&str] = &["feature_type", "type"];

/// A named surface feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Canonical name as written in the table.
    pub name: String,
    /// Center longitude in degrees east, within [-180, 180).
    pub longitude: f64,
    /// Center latitude in degrees, within [-90, 90].
    pub latitude: f64,
    /// Nominal diameter in kilometers.
    pub diameter_km: f64,
    /// Feature type (e.g. "Crater, craters"), when the table has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_type: Option<String>,
}

impl Feature {
    /// Create a feature, validating and normalizing its coordinates.
    pub fn new(name: impl Into<String>, longitude: f64, latitude: f64, diameter_km: f64) -> Result<Self> {
        let name = name.into();
        let invalid = |message: String| FeatureError::load(&name, None, message);
        if name.trim().is_empty() {
            return Err(invalid("empty feature name".into()));
        }
        if !longitude.is_finite() {
            return Err(invalid(format!("longitude {longitude} is not finite")));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(invalid(format!("latitude {latitude} outside [-90, 90]")));
        }
        if !(diameter_km >= 0.0 && diameter_km.is_finite()) {
            return Err(invalid(format!("diameter {diameter_km} must be a non-negative number")));
        }
        Ok(Self {
            name: name.trim().to_string(),
            longitude: normalize_lon(longitude),
            latitude,
            diameter_km,
            feature_type: None,
        })
    }
}

/// Wrap a longitude into [-180, 180); IAU tables use 0..360 east.
///
/// Mirrors `lunar_dem::projection::normalize_lon`; this crate does not depend
/// on the raster stack.
fn normalize_lon(lon: f64) -> f64 {
    if (-180.0..180.0).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Read-only lookup table of features keyed by lowercased name.
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    features: Vec<Feature>,
    index: HashMap<String, usize>,
}

impl FeatureCatalog {
    /// Load a CSV feature table from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        let file = File::open(path).map_err(|e| FeatureError::load(&source_name, None, e.to_string()))?;
        let catalog = Self::from_reader_named(file, &source_name)?;
        tracing::info!(path = %source_name, features = catalog.len(), "loaded feature catalog");
        Ok(catalog)
    }

    /// Load a CSV feature table from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_named(reader, "<reader>")
    }

    fn from_reader_named<R: Read>(reader: R, source_name: &str) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv
            .headers()
            .map_err(|e| FeatureError::load(source_name, None, e.to_string()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let column = |aliases: &[&str]| aliases.iter().find_map(|a| headers.iter().position(|h| h == a));
        let required = |aliases: &[&str]| {
            column(aliases).ok_or_else(|| {
                FeatureError::load(source_name, None, format!("missing required column '{}'", aliases[0]))
            })
        };
        let name_col = required(NAME_COLUMNS)?;
        let lon_col = required(LONGITUDE_COLUMNS)?;
        let lat_col = required(LATITUDE_COLUMNS)?;
        let diameter_col = required(DIAMETER_COLUMNS)?;
        let type_col = column(TYPE_COLUMNS);

        let mut features = Vec::new();
        for record in csv.records() {
            let record = record.map_err(|e| FeatureError::load(source_name, None, e.to_string()))?;
            let line = record.position().map(|p| p.line());
            let field = |col: usize| record.get(col).unwrap_or("");
            let number = |col: usize, what: &str| {
                field(col).parse::<f64>().map_err(|_| {
                    FeatureError::load(source_name, line, format!("non-numeric {what} '{}'", field(col)))
                })
            };

            let name = field(name_col);
            if name.is_empty() {
                tracing::warn!(source = source_name, ?line, "skipping feature with an empty name");
                continue;
            }
            let mut feature = Feature::new(
                name,
                number(lon_col, "longitude")?,
                number(lat_col, "latitude")?,
                number(diameter_col, "diameter")?,
            )
            .map_err(|e| match e {
                FeatureError::CatalogLoad { message, .. } => {
                    FeatureError::load(source_name, line, format!("{name}: {message}"))
                }
                other => other,
            })?;
            feature.feature_type = type_col.map(field).filter(|t| !t.is_empty()).map(str::to_string);
            features.push(feature);
        }

        Ok(Self::from_features_named(features, source_name))
    }

    /// Build a catalog from features already in memory.
    pub fn from_features(features: impl IntoIterator<Item = Feature>) -> Self {
        Self::from_features_named(features, "<memory>")
    }

    fn from_features_named(features: impl IntoIterator<Item = Feature>, source_name: &str) -> Self {
        let mut catalog = Self::default();
        for feature in features {
            let key = feature.name.to_lowercase();
            if catalog.index.contains_key(&key) {
                tracing::warn!(source = source_name, name = %feature.name, "duplicate feature name; keeping the first");
                continue;
            }
            catalog.index.insert(key, catalog.features.len());
            catalog.features.push(feature);
        }
        catalog
    }

    /// Find a feature by name, ignoring case and surrounding whitespace.
    pub fn lookup(&self, name: &str) -> Result<&Feature> {
        self.index
            .get(&name.trim().to_lowercase())
            .map(|&i| &self.features[i])
            .ok_or_else(|| FeatureError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.trim().to_lowercase())
    }

    /// Features in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
