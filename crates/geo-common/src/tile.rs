//! Web Mercator quadtree tile addressing.
//!
//! Tiles follow the XYZ convention: at zoom `z` the world square
//! `[-E, E] x [-E, E]` (EPSG:3857 meters) is split into `2^z x 2^z` tiles,
//! with `x` growing eastwards and `y` growing southwards from the top-left.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Half the width of the Web Mercator world square in meters.
pub const WEB_MERCATOR_EXTENT: f64 = 20037508.342789244;

/// Tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;

/// Ground resolution of zoom 0 at the equator, meters per pixel.
pub const ZOOM0_RESOLUTION: f64 = 156543.03392804097;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at `zoom`.
    pub fn tiles_per_axis(zoom: u32) -> u64 {
        1u64 << zoom
    }

    /// Whether x and y lie within `[0, 2^z)`.
    pub fn is_valid(&self) -> bool {
        let n = Self::tiles_per_axis(self.z);
        (self.x as u64) < n && (self.y as u64) < n
    }

    /// Relative path of the tile image: `{z}/{x}/{y}.png`.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.z.to_string())
            .join(self.x.to_string())
            .join(format!("{}.png", self.y))
    }

    /// Absolute path of the tile image below `root`.
    pub fn path_in(&self, root: &Path) -> PathBuf {
        root.join(self.relative_path())
    }

    /// Get the parent tile (zoom - 1).
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// Projected (EPSG:3857) extent of this tile.
    pub fn mercator_bounds(&self) -> BoundingBox {
        let span = tile_span(self.z);
        let min_x = -WEB_MERCATOR_EXTENT + self.x as f64 * span;
        let max_y = WEB_MERCATOR_EXTENT - self.y as f64 * span;
        BoundingBox::new(min_x, max_y - span, min_x + span, max_y)
    }

    /// Geographic (lon/lat degrees) extent of this tile.
    pub fn lonlat_bounds(&self) -> BoundingBox {
        let n = Self::tiles_per_axis(self.z) as f64;

        let lon_min = self.x as f64 / n * 360.0 - 180.0;
        let lon_max = (self.x as f64 + 1.0) / n * 360.0 - 180.0;

        let lat_max = (std::f64::consts::PI * (1.0 - 2.0 * self.y as f64 / n))
            .sinh()
            .atan()
            .to_degrees();
        let lat_min = (std::f64::consts::PI * (1.0 - 2.0 * (self.y as f64 + 1.0) / n))
            .sinh()
            .atan()
            .to_degrees();

        BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Projected width of one tile at `zoom`, in meters.
pub fn tile_span(zoom: u32) -> f64 {
    2.0 * WEB_MERCATOR_EXTENT / TileCoord::tiles_per_axis(zoom) as f64
}

/// Meters per pixel of a 256 px tile at `zoom`.
pub fn zoom_resolution(zoom: u32) -> f64 {
    tile_span(zoom) / TILE_SIZE as f64
}

/// Zoom level whose resolution first matches or exceeds `resolution` meters per pixel,
/// clamped to the common web range `[0, 22]`. Returns `None` for non-positive input.
pub fn suggested_max_zoom(resolution: f64) -> Option<u32> {
    let res = resolution.abs();
    if !res.is_finite() || res <= 0.0 {
        return None;
    }
    let z = (ZOOM0_RESOLUTION / res).log2().ceil();
    Some(z.clamp(0.0, 22.0) as u32)
}

/// A rectangular window in source pixel space (fractional offsets allowed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelWindow {
    pub x_off: f64,
    pub y_off: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelWindow {
    pub fn new(x_off: f64, y_off: f64, width: f64, height: f64) -> Self {
        Self {
            x_off,
            y_off,
            width,
            height,
        }
    }

    /// Whether any part of the window overlaps a `width` x `height` raster.
    pub fn overlaps(&self, width: u32, height: u32) -> bool {
        self.x_off < width as f64
            && self.y_off < height as f64
            && self.x_off + self.width > 0.0
            && self.y_off + self.height > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom0_covers_world() {
        let b = TileCoord::new(0, 0, 0).mercator_bounds();
        assert_eq!(b.min_x, -WEB_MERCATOR_EXTENT);
        assert_eq!(b.max_x, WEB_MERCATOR_EXTENT);
        assert_eq!(b.min_y, -WEB_MERCATOR_EXTENT);
        assert_eq!(b.max_y, WEB_MERCATOR_EXTENT);
    }

    #[test]
    fn test_relative_path() {
        let coord = TileCoord::new(5, 17, 11);
        assert_eq!(coord.relative_path(), PathBuf::from("5/17/11.png"));
        assert_eq!(coord.to_string(), "5/17/11");
    }

    #[test]
    fn test_suggested_max_zoom() {
        assert_eq!(suggested_max_zoom(ZOOM0_RESOLUTION), Some(0));
        assert_eq!(suggested_max_zoom(ZOOM0_RESOLUTION / 1024.0), Some(10));
        // Slightly coarser than zoom 10 still rounds up to 10
        assert_eq!(suggested_max_zoom(ZOOM0_RESOLUTION / 1000.0), Some(10));
        assert_eq!(suggested_max_zoom(0.001), Some(22));
        assert_eq!(suggested_max_zoom(1e9), Some(0));
        assert_eq!(suggested_max_zoom(0.0), None);
    }

    #[test]
    fn test_lonlat_bounds_zoom1() {
        let b = TileCoord::new(1, 0, 0).lonlat_bounds();
        assert!((b.min_x - (-180.0)).abs() < 1e-9);
        assert!((b.max_x - 0.0).abs() < 1e-9);
        assert!((b.min_y - 0.0).abs() < 1e-9);
        assert!((b.max_y - 85.0511287798).abs() < 1e-6);
    }
}
