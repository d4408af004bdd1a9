//! Parallel tile cutting and PNG writing.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use geo_common::{GeomosaicError, GeomosaicResult, TILE_SIZE};
use rayon::prelude::*;
use renderer::is_fully_transparent;
use renderer::png::create_png_auto;
use serde::Serialize;
use tracing::{debug, info};

use crate::planner::{CoveragePlan, PlannedTile, Tiler};

/// Progress is logged each time this fraction of the plan completes.
const PROGRESS_STEPS: u64 = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct CutOptions {
    /// Skip tiles without any opaque pixel.
    pub exclude_transparent: bool,
}

/// Counters for one cutting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CutStats {
    pub planned: u64,
    pub written: u64,
    pub skipped_transparent: u64,
    pub bytes_written: u64,
}

#[derive(Default)]
struct Counters {
    done: AtomicU64,
    written: AtomicU64,
    skipped: AtomicU64,
    bytes: AtomicU64,
}

/// Cut every tile of `plan` and write it to `{output_dir}/{z}/{x}/{y}.png`.
///
/// Runs on the current rayon pool. Each tile owns its own file, so workers
/// never share anything but directory creation. The first write failure
/// stops the remaining work and is returned.
pub fn cut_pyramid<T>(
    tiler: &T,
    plan: &CoveragePlan,
    output_dir: &Path,
    options: &CutOptions,
) -> GeomosaicResult<CutStats>
where
    T: Tiler + Sync + ?Sized,
{
    let start = Instant::now();
    let planned = plan.tile_count();
    let progress_step = (planned / PROGRESS_STEPS).max(1);
    let counters = Counters::default();

    info!(
        tiles = planned,
        zooms = plan.ranges.len(),
        threads = rayon::current_num_threads(),
        "Cutting tiles"
    );

    plan.tiles().par_bridge().try_for_each(|tile| {
        let written = cut_one(tiler, &tile, output_dir, options)?;
        match written {
            Some(bytes) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
                counters.bytes.fetch_add(bytes, Ordering::Relaxed);
            }
            None => {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
            }
        }

        let done = counters.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % progress_step == 0 || done == planned {
            info!(
                done = done,
                total = planned,
                percent = (done * 100) / planned.max(1),
                "Tile cutting progress"
            );
        }
        Ok::<(), GeomosaicError>(())
    })?;

    let stats = CutStats {
        planned,
        written: counters.written.load(Ordering::Relaxed),
        skipped_transparent: counters.skipped.load(Ordering::Relaxed),
        bytes_written: counters.bytes.load(Ordering::Relaxed),
    };
    info!(
        written = stats.written,
        skipped = stats.skipped_transparent,
        bytes = stats.bytes_written,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Tile cutting complete"
    );
    Ok(stats)
}

/// Returns the encoded size, or `None` when the tile was skipped.
fn cut_one<T>(tiler: &T, tile: &PlannedTile, output_dir: &Path, options: &CutOptions) -> GeomosaicResult<Option<u64>>
where
    T: Tiler + ?Sized,
{
    let pixels = tiler.cut(tile);
    if options.exclude_transparent && is_fully_transparent(&pixels) {
        debug!(tile = %tile.coord, "Skipping transparent tile");
        return Ok(None);
    }

    let path = tile.coord.path_in(output_dir);
    let png = create_png_auto(&pixels, TILE_SIZE as usize, TILE_SIZE as usize)
        .map_err(|e| GeomosaicError::tile_write(&path, e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GeomosaicError::tile_write(parent, e))?;
    }
    fs::write(&path, &png).map_err(|e| GeomosaicError::tile_write(&path, e))?;
    Ok(Some(png.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_common::{AffineTransform, Resampling};
    use renderer::RgbaView;

    use crate::planner::RasterTiler;

    fn opaque_square(size: usize) -> Vec<u8> {
        [10u8, 200, 30, 255].iter().copied().cycle().take(size * size * 4).collect()
    }

    #[test]
    fn test_writes_tile_tree() {
        let dir = tempfile::tempdir().unwrap();
        let pixels = opaque_square(64);
        let view = RgbaView::new(&pixels, 64, 64).unwrap();
        let transform = AffineTransform::north_up(-640_000.0, 640_000.0, 20_000.0, -20_000.0);
        let tiler = RasterTiler::new(view, transform, Resampling::Nearest);
        let plan = tiler.plan(0, 2);

        let stats = cut_pyramid(&tiler, &plan, dir.path(), &CutOptions::default()).unwrap();
        assert_eq!(stats.planned, plan.tile_count());
        assert_eq!(stats.written, stats.planned);
        assert!(dir.path().join("0/0/0.png").is_file());
        for tile in plan.tiles() {
            assert!(tile.coord.path_in(dir.path()).is_file(), "{}", tile.coord);
        }
    }

    #[test]
    fn test_exclude_transparent() {
        let dir = tempfile::tempdir().unwrap();
        let pixels = vec![0u8; 8 * 8 * 4];
        let view = RgbaView::new(&pixels, 8, 8).unwrap();
        let transform = AffineTransform::north_up(0.0, 80_000.0, 10_000.0, -10_000.0);
        let tiler = RasterTiler::new(view, transform, Resampling::Nearest);
        let plan = tiler.plan(0, 1);

        let options = CutOptions {
            exclude_transparent: true,
        };
        let stats = cut_pyramid(&tiler, &plan, dir.path(), &options).unwrap();
        assert_eq!(stats.written, 0);
        assert_eq!(stats.skipped_transparent, plan.tile_count());
        assert!(!dir.path().join("0").exists());
    }

    #[test]
    fn test_write_failure_is_tile_write_error() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the zoom directory should go
        fs::write(dir.path().join("0"), b"blocker").unwrap();

        let pixels = opaque_square(4);
        let view = RgbaView::new(&pixels, 4, 4).unwrap();
        let transform = AffineTransform::north_up(0.0, 40_000.0, 10_000.0, -10_000.0);
        let tiler = RasterTiler::new(view, transform, Resampling::Nearest);
        let plan = tiler.plan(0, 0);

        let err = cut_pyramid(&tiler, &plan, dir.path(), &CutOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "TileWriteError");
    }
}
