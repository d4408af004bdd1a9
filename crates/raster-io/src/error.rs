//! Raster I/O error types.

use projection::ProjectionError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Unsupported raster: {0}")]
    Unsupported(String),

    #[error("Invalid raster data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("Warp failed: {0}")]
    Warp(String),
}

impl RasterError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RasterError::Io {
            path: path.into(),
            source,
        }
    }
}
