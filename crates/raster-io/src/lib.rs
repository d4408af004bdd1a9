//! Raster I/O and reprojection for GeoTIFF sources.
//!
//! Pure Rust (no GDAL): pixels and tags are read and written with the `tiff`
//! crate, georeferencing follows the GeoTIFF 1.1 tag layout, and warping to
//! Web Mercator uses the `projection` crate.

pub mod error;
pub mod geotags;
pub mod patch;
pub mod raster;
pub mod reader;
pub mod warp;
pub mod writer;

pub use error::RasterError;
pub use geotags::{GeoKeyDirectory, GeoTags, TagValue};
pub use raster::{Raster, SampleKind, Samples};
pub use reader::{read_geotiff, read_info, GeoTiffInfo};
pub use warp::{MercatorWarper, SourceReference, WarpOptions, WarpedRaster, Warper};
pub use writer::write_geotiff;
