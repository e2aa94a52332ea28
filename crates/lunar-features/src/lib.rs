//! # lunar-features
//!
//! Lookup of named lunar surface features (craters, maria, ...) by name.
//!
//! Tables come from the IAU Gazetteer of Planetary Nomenclature
//! (<https://planetarynames.wr.usgs.gov/>) exported as CSV. Column names are
//! matched case-insensitively; both the gazetteer headers
//! (`Feature_Name`, `Center_Longitude`, `Center_Latitude`, `Diameter`) and
//! plain ones (`name`, `longitude`, `latitude`, `diameter_km`) are accepted.
//!
//! ```no_run
//! use lunar_features::FeatureCatalog;
//!
//! let catalog = FeatureCatalog::from_path("data/craters.csv")?;
//! let tycho = catalog.lookup("tycho")?;
//! println!("{} at ({}, {}), {} km", tycho.name, tycho.longitude, tycho.latitude, tycho.diameter_km);
//! # Ok::<(), lunar_features::FeatureError>(())
//! ```

mod catalog;
mod error;

pub use catalog::{Feature, FeatureCatalog};
pub use error::{FeatureError, FeatureErrorKind};

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, FeatureError>;
