//! Projection error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    #[error("Invalid projection definition '{definition}': {message}")]
    InvalidDefinition { definition: String, message: String },

    #[error("Coordinate transform failed: {0}")]
    TransformFailed(String),

    #[error("Cannot fit ground control points: {0}")]
    InsufficientGcps(String),

    #[error("Failed to read CRS definitions from {}: {message}", path.display())]
    DefinitionsFile { path: PathBuf, message: String },
}
