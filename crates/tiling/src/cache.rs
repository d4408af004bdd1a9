//! Cache directory lifecycle and cleanup of failed runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use geo_common::{GeomosaicError, GeomosaicResult};
use tracing::{debug, info, warn};

use crate::preview::PREVIEW_FILE_NAME;

/// Name of the private working directory inside the output directory.
pub const CACHE_DIR_NAME: &str = "_cache";

/// File name of the reprojected intermediate raster.
pub const WARPED_FILE_NAME: &str = "warped_3857.tif";

/// Owns the cache directory of one tiling run.
#[derive(Debug)]
pub struct CacheManager {
    output_dir: PathBuf,
    cache_dir: PathBuf,
    created_output: bool,
}

impl CacheManager {
    /// Create the output and cache directories. A stale cache left by an
    /// interrupted run is removed first.
    pub fn prepare(output_dir: &Path) -> GeomosaicResult<Self> {
        let created_output = !output_dir.exists();
        fs::create_dir_all(output_dir).map_err(|e| GeomosaicError::tile_write(output_dir, e))?;

        let cache_dir = output_dir.join(CACHE_DIR_NAME);
        if cache_dir.exists() {
            debug!(path = %cache_dir.display(), "Removing stale cache directory");
            fs::remove_dir_all(&cache_dir).map_err(|e| GeomosaicError::tile_write(&cache_dir, e))?;
        }
        fs::create_dir_all(&cache_dir).map_err(|e| GeomosaicError::tile_write(&cache_dir, e))?;

        debug!(path = %cache_dir.display(), "Cache directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            cache_dir,
            created_output,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where the reprojection stage writes its output.
    pub fn warped_path(&self) -> PathBuf {
        self.cache_dir.join(WARPED_FILE_NAME)
    }

    /// Finalize a successful run. With `keep_intermediate` only the warped
    /// raster survives in the cache directory; otherwise the directory goes.
    /// Returns the retained intermediate, if any.
    pub fn finish(&self, keep_intermediate: bool) -> GeomosaicResult<Option<PathBuf>> {
        if !keep_intermediate {
            fs::remove_dir_all(&self.cache_dir).map_err(|e| GeomosaicError::tile_write(&self.cache_dir, e))?;
            debug!(path = %self.cache_dir.display(), "Cache directory removed");
            return Ok(None);
        }

        let warped = self.warped_path();
        let entries = fs::read_dir(&self.cache_dir).map_err(|e| GeomosaicError::tile_write(&self.cache_dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| GeomosaicError::tile_write(&self.cache_dir, e))?.path();
            if path != warped {
                remove_path(&path).map_err(|e| GeomosaicError::tile_write(&path, e))?;
            }
        }
        info!(path = %warped.display(), "Keeping intermediate raster");
        Ok(warped.is_file().then_some(warped))
    }

    /// Best-effort removal of everything a failed run may have written: the
    /// cache, tiles for the job's zoom levels and the preview page. The output
    /// directory itself goes too when this run created it and it ends up
    /// empty. Failures are logged and otherwise ignored.
    pub fn abort(&self, min_zoom: u32, max_zoom: u32) {
        let mut targets = vec![self.cache_dir.clone(), self.output_dir.join(PREVIEW_FILE_NAME)];
        targets.extend((min_zoom..=max_zoom).map(|z| self.output_dir.join(z.to_string())));

        for path in targets {
            if !path.exists() {
                continue;
            }
            match remove_path(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed partial output"),
                Err(e) => warn!(path = %path.display(), error = %e, "Cleanup failed"),
            }
        }

        if self.created_output && is_empty_dir(&self.output_dir) {
            if let Err(e) = fs::remove_dir(&self.output_dir) {
                warn!(path = %self.output_dir.display(), error = %e, "Cleanup failed");
            }
        }
        info!(output = %self.output_dir.display(), "Cleaned up after failed run");
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
