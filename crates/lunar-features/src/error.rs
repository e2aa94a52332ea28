//! Error types for the feature catalog.

use thiserror::Error;

/// Coarse classification of a [`FeatureError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureErrorKind {
    NotFound,
    CatalogLoad,
}

/// Errors raised while loading or querying a catalog.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// No feature has this name.
    #[error("Feature not found: {0}")]
    NotFound(String),

    /// The feature table could not be read or is malformed.
    #[error("Failed to load feature catalog {source_name}: {message}")]
    CatalogLoad {
        /// File name or other description of the table.
        source_name: String,
        message: String,
    },
}

impl FeatureError {
    pub fn kind(&self) -> FeatureErrorKind {
        match self {
            FeatureError::NotFound(_) => FeatureErrorKind::NotFound,
            FeatureError::CatalogLoad { .. } => FeatureErrorKind::CatalogLoad,
        }
    }

    pub(crate) fn load(source_name: &str, line: Option<u64>, message: impl Into<String>) -> Self {
        let message = message.into();
        FeatureError::CatalogLoad {
            source_name: source_name.to_string(),
            message: match line {
                Some(line) => format!("line {line}: {message}"),
                None => message,
            },
        }
    }
}
