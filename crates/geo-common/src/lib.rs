//! Common types and utilities shared across the geomosaic crates.

pub mod bbox;
pub mod error;
pub mod georef;
pub mod resampling;
pub mod tile;

pub use bbox::BoundingBox;
pub use error::{GeomosaicError, GeomosaicResult};
pub use georef::{AffineTransform, Georeference, GroundControlPoint, SpatialReference};
pub use resampling::Resampling;
pub use tile::{PixelWindow, TileCoord, TILE_SIZE, WEB_MERCATOR_EXTENT};
