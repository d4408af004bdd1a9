//! Pixel kernels and PNG encoding for map tiles.
//!
//! - `sample`: alpha-aware nearest/bilinear/cubic sampling of RGBA rasters
//! - `tile`: resampling a source pixel window into a square tile
//! - `png`: indexed and RGBA PNG encoders

pub mod png;
pub mod sample;
pub mod tile;

pub use sample::RgbaView;
pub use tile::{is_fully_transparent, render_tile};
