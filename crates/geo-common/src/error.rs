//! Error taxonomy for geomosaic operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using GeomosaicError.
pub type GeomosaicResult<T> = Result<T, GeomosaicError>;

/// Terminal error surfaced to callers of the tiling pipeline and the georeference codec.
#[derive(Debug, Error)]
pub enum GeomosaicError {
    // === Validation ===
    #[error("Invalid input: {0}")]
    InputValidation(String),

    // === Pipeline ===
    #[error("Reprojection failed: {0}")]
    Reprojection(String),

    #[error("Failed to write {}: {message}", path.display())]
    TileWrite { path: PathBuf, message: String },

    // === Georeference codec ===
    #[error("Georeference I/O error: {0}")]
    GeoreferenceIo(String),

    #[error("Invalid georeference document: {0}")]
    GeoreferenceFormat(String),

    // === Environment ===
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GeomosaicError {
    /// Build a tile write error from an I/O failure on `path`.
    pub fn tile_write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        GeomosaicError::TileWrite {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Name of the error kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            GeomosaicError::InputValidation(_) => "InputValidationError",
            GeomosaicError::Reprojection(_) => "ReprojectionError",
            GeomosaicError::TileWrite { .. } => "TileWriteError",
            GeomosaicError::GeoreferenceIo(_) => "GeoreferenceIOError",
            GeomosaicError::GeoreferenceFormat(_) => "GeoreferenceFormatError",
            GeomosaicError::Configuration(_) => "ConfigurationError",
        }
    }

    /// Process exit status used by the command-line front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            GeomosaicError::InputValidation(_) => 2,
            GeomosaicError::Reprojection(_) => 3,
            GeomosaicError::TileWrite { .. } => 4,
            GeomosaicError::GeoreferenceIo(_) => 5,
            GeomosaicError::GeoreferenceFormat(_) => 6,
            GeomosaicError::Configuration(_) => 7,
        }
    }
}

impl From<serde_json::Error> for GeomosaicError {
    fn from(err: serde_json::Error) -> Self {
        GeomosaicError::GeoreferenceFormat(format!("JSON error: {}", err))
    }
}
