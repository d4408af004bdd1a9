//! Web Mercator tile pyramid generation.
//!
//! A [`TilingJob`] runs once through a strictly ordered pipeline:
//! reprojection into a cache directory, coverage planning, parallel tile
//! cutting, preview page, cache cleanup.

pub mod cache;
pub mod config;
pub mod cutter;
pub mod job;
pub mod pipeline;
pub mod planner;
pub mod preview;
pub mod reproject;

pub use cache::{CacheManager, CACHE_DIR_NAME, WARPED_FILE_NAME};
pub use config::{RuntimeConfig, TilingConfig};
pub use cutter::{cut_pyramid, CutOptions, CutStats};
pub use job::{NodataPolicy, TilingJob, DEFAULT_MAX_SOURCE_PIXELS, MAX_ZOOM_LIMIT};
pub use pipeline::{run, run_with, TilingReport};
pub use planner::{CoveragePlan, PlannedTile, RasterTiler, TileRange, Tiler};
pub use preview::{PreviewPage, PREVIEW_FILE_NAME};
pub use reproject::{PreparedSource, ReprojectedRaster};
