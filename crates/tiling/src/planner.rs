//! Tile coverage planning.
//!
//! At zoom `z` the world square is split into `2^z x 2^z` tiles. A tile is
//! planned when its half-open extent `[min, max)` overlaps the raster's
//! half-open extent, so a raster edge lying exactly on a tile boundary
//! belongs to the lower-indexed tile only.

use geo_common::tile::tile_span;
use geo_common::{
    AffineTransform, BoundingBox, PixelWindow, Resampling, TileCoord, TILE_SIZE, WEB_MERCATOR_EXTENT,
};
use renderer::{render_tile, RgbaView};

/// Grid coordinates within this distance of an integer are snapped to it.
const GRID_SNAP: f64 = 1e-9;

/// Inclusive range of tile indices at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u32,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Tiles at `zoom` overlapping `bounds` (EPSG:3857 meters). `None` for
    /// degenerate bounds or bounds outside the world square.
    pub fn for_bounds(bounds: &BoundingBox, zoom: u32) -> Option<Self> {
        if bounds.is_degenerate() {
            return None;
        }
        let world = BoundingBox::new(
            -WEB_MERCATOR_EXTENT,
            -WEB_MERCATOR_EXTENT,
            WEB_MERCATOR_EXTENT,
            WEB_MERCATOR_EXTENT,
        );
        let clipped = bounds.intersection(&world)?;
        if clipped.is_degenerate() {
            return None;
        }

        let span = tile_span(zoom);
        let last = (TileCoord::tiles_per_axis(zoom) - 1) as f64;
        let first_index = |v: f64| snap(v / span).floor().clamp(0.0, last) as u32;
        let last_index = |v: f64| (snap(v / span).ceil() - 1.0).clamp(0.0, last) as u32;

        // A sliver thinner than the snap tolerance collapses onto one edge;
        // it still covers the tile that edge opens.
        let min_x = first_index(clipped.min_x + WEB_MERCATOR_EXTENT);
        let min_y = first_index(WEB_MERCATOR_EXTENT - clipped.max_y);
        Some(Self {
            zoom,
            min_x,
            max_x: last_index(clipped.max_x + WEB_MERCATOR_EXTENT).max(min_x),
            min_y,
            max_y: last_index(WEB_MERCATOR_EXTENT - clipped.min_y).max(min_y),
        })
    }

    pub fn width(&self) -> u64 {
        (self.max_x - self.min_x) as u64 + 1
    }

    pub fn height(&self) -> u64 {
        (self.max_y - self.min_y) as u64 + 1
    }

    pub fn tile_count(&self) -> u64 {
        self.width() * self.height()
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        coord.z == self.zoom
            && (self.min_x..=self.max_x).contains(&coord.x)
            && (self.min_y..=self.max_y).contains(&coord.y)
    }

    /// Column-major iteration: x outer, y inner.
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.min_x..=self.max_x)
            .flat_map(move |x| (self.min_y..=self.max_y).map(move |y| TileCoord::new(self.zoom, x, y)))
    }
}

fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < GRID_SNAP {
        r
    } else {
        v
    }
}

/// A tile to cut and the intermediate-raster pixel window covering it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedTile {
    pub coord: TileCoord,
    pub window: PixelWindow,
}

/// Tiles to produce for a zoom range, with the geometry needed to cut them.
#[derive(Debug, Clone)]
pub struct CoveragePlan {
    pub ranges: Vec<TileRange>,
    /// North-up transform of the intermediate raster.
    pub transform: AffineTransform,
}

impl CoveragePlan {
    /// Plan every zoom in `min_zoom..=max_zoom` for a raster of the given
    /// size placed by `transform`.
    pub fn new(transform: AffineTransform, width: u32, height: u32, min_zoom: u32, max_zoom: u32) -> Self {
        let bounds = transform.bounds(width, height);
        let ranges = (min_zoom..=max_zoom)
            .filter_map(|z| TileRange::for_bounds(&bounds, z))
            .collect();
        Self { ranges, transform }
    }

    pub fn tile_count(&self) -> u64 {
        self.ranges.iter().map(TileRange::tile_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Lazily enumerate planned tiles, lowest zoom first. Each call starts over.
    pub fn tiles(&self) -> impl Iterator<Item = PlannedTile> + '_ {
        self.ranges
            .iter()
            .flat_map(|range| range.coords())
            .map(move |coord| PlannedTile {
                coord,
                window: self.window(&coord),
            })
    }

    /// Pixel window of the intermediate raster covering `coord`.
    pub fn window(&self, coord: &TileCoord) -> PixelWindow {
        let tile = coord.mercator_bounds();
        let res_x = self.transform.pixel_width;
        let res_y = -self.transform.pixel_height;
        PixelWindow::new(
            (tile.min_x - self.transform.origin_x) / res_x,
            (self.transform.origin_y - tile.max_y) / res_y,
            tile.width() / res_x,
            tile.height() / res_y,
        )
    }
}

/// Produces a tile pyramid from a georeferenced image.
pub trait Tiler {
    /// Coverage of the image for `min_zoom..=max_zoom`.
    fn plan(&self, min_zoom: u32, max_zoom: u32) -> CoveragePlan;

    /// RGBA pixels of one tile, `TILE_SIZE x TILE_SIZE`.
    fn cut(&self, tile: &PlannedTile) -> Vec<u8>;
}

/// In-process tiler over an RGBA Web Mercator raster.
#[derive(Debug, Clone, Copy)]
pub struct RasterTiler<'a> {
    view: RgbaView<'a>,
    transform: AffineTransform,
    resampling: Resampling,
}

impl<'a> RasterTiler<'a> {
    pub fn new(view: RgbaView<'a>, transform: AffineTransform, resampling: Resampling) -> Self {
        Self {
            view,
            transform,
            resampling,
        }
    }
}

impl Tiler for RasterTiler<'_> {
    fn plan(&self, min_zoom: u32, max_zoom: u32) -> CoveragePlan {
        CoveragePlan::new(
            self.transform,
            self.view.width() as u32,
            self.view.height() as u32,
            min_zoom,
            max_zoom,
        )
    }

    fn cut(&self, tile: &PlannedTile) -> Vec<u8> {
        render_tile(&self.view, &tile.window, TILE_SIZE as usize, self.resampling)
    }
}
