//! The tiling pipeline: validate, reproject, plan, cut, preview, clean up.

use std::path::PathBuf;
use std::time::Instant;

use geo_common::{BoundingBox, GeomosaicError, GeomosaicResult};
use raster_io::{MercatorWarper, Warper};
use renderer::RgbaView;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::CacheManager;
use crate::config::RuntimeConfig;
use crate::cutter::{cut_pyramid, CutOptions, CutStats};
use crate::job::TilingJob;
use crate::planner::{RasterTiler, Tiler};
use crate::preview::PreviewPage;
use crate::reproject::PreparedSource;

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct TilingReport {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub min_zoom: u32,
    pub max_zoom: u32,
    pub tiles_planned: u64,
    pub tiles_written: u64,
    pub tiles_skipped: u64,
    pub bytes_written: u64,
    /// Geographic bounds of the pyramid, degrees.
    pub bounds: BoundingBox,
    /// Web Mercator bounds of the intermediate raster.
    pub mercator_bounds: BoundingBox,
    pub suggested_max_zoom: Option<u32>,
    pub preview: PathBuf,
    /// Retained intermediate raster, when requested.
    pub intermediate: Option<PathBuf>,
    pub elapsed_ms: u64,
}

/// Run `job` with the bundled Web Mercator warper.
pub fn run(job: &TilingJob, runtime: &RuntimeConfig) -> GeomosaicResult<TilingReport> {
    run_with(job, runtime, &MercatorWarper::default())
}

/// Run `job` with a caller-supplied warper.
///
/// Nothing is written until the job is validated and the source is known to
/// be reprojectable. From then on any failure removes partial output before
/// the error is returned.
pub fn run_with(
    job: &TilingJob,
    runtime: &RuntimeConfig,
    warper: &(dyn Warper + Sync),
) -> GeomosaicResult<TilingReport> {
    let start = Instant::now();
    job.validate()?;
    let (min_zoom, max_zoom) = job.zoom_range();

    let source = PreparedSource::prepare(&job.input, &runtime.registry)?;
    job.check_source_size(source.info.georef.width, source.info.georef.height)?;
    let pool = build_thread_pool(job.threads)?;

    info!(
        input = %job.input.display(),
        output = %job.output_dir.display(),
        min_zoom = min_zoom,
        max_zoom = max_zoom,
        resampling = %job.resampling,
        nodata = %job.nodata,
        threads = pool.current_num_threads(),
        "Starting tiling job"
    );

    let cache = CacheManager::prepare(&job.output_dir)?;
    let outcome = pool
        .install(|| execute(job, runtime, &source, &cache, warper))
        .and_then(|stage| {
            let intermediate = cache.finish(job.keep_intermediate)?;
            Ok((stage, intermediate))
        });

    let (stage, intermediate) = match outcome {
        Ok(done) => done,
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "Tiling job failed, removing partial output");
            cache.abort(min_zoom, max_zoom);
            return Err(e);
        }
    };

    let report = TilingReport {
        input: job.input.clone(),
        output_dir: job.output_dir.clone(),
        min_zoom,
        max_zoom,
        tiles_planned: stage.stats.planned,
        tiles_written: stage.stats.written,
        tiles_skipped: stage.stats.skipped_transparent,
        bytes_written: stage.stats.bytes_written,
        bounds: stage.lonlat_bounds,
        mercator_bounds: stage.mercator_bounds,
        suggested_max_zoom: stage.suggested_max_zoom,
        preview: stage.preview,
        intermediate,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        tiles = report.tiles_written,
        skipped = report.tiles_skipped,
        elapsed_ms = report.elapsed_ms,
        preview = %report.preview.display(),
        "Tiling job complete"
    );
    Ok(report)
}

struct StageOutput {
    stats: CutStats,
    lonlat_bounds: BoundingBox,
    mercator_bounds: BoundingBox,
    suggested_max_zoom: Option<u32>,
    preview: PathBuf,
}

fn execute(
    job: &TilingJob,
    runtime: &RuntimeConfig,
    source: &PreparedSource,
    cache: &CacheManager,
    warper: &(dyn Warper + Sync),
) -> GeomosaicResult<StageOutput> {
    let (min_zoom, max_zoom) = job.zoom_range();
    let reprojected = source.reproject(
        warper,
        job.resampling,
        job.nodata,
        &runtime.registry,
        &cache.warped_path(),
    )?;
    if let Some(suggested) = reprojected.suggested_max_zoom {
        if max_zoom > suggested + 2 {
            warn!(
                max_zoom = max_zoom,
                suggested_max_zoom = suggested,
                "Max zoom is well beyond the source resolution"
            );
        }
    }

    let warped = &reprojected.warped;
    let view = RgbaView::new(
        warped.rgba(),
        warped.raster.width as usize,
        warped.raster.height as usize,
    )
    .ok_or_else(|| GeomosaicError::Reprojection("intermediate raster is not RGBA8".to_string()))?;
    let tiler = RasterTiler::new(view, warped.transform, job.resampling);
    let plan = tiler.plan(min_zoom, max_zoom);

    let options = CutOptions {
        exclude_transparent: job.exclude_transparent,
    };
    let stats = cut_pyramid(&tiler, &plan, &job.output_dir, &options)?;

    // Written last: its presence marks a complete pyramid
    let preview = PreviewPage::new(job.title.clone(), min_zoom, max_zoom, reprojected.lonlat_bounds)
        .write(&job.output_dir)?;

    Ok(StageOutput {
        stats,
        lonlat_bounds: reprojected.lonlat_bounds,
        mercator_bounds: reprojected.bounds,
        suggested_max_zoom: reprojected.suggested_max_zoom,
        preview,
    })
}

fn build_thread_pool(threads: Option<usize>) -> GeomosaicResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("geomosaic-{}", i));
    if let Some(count) = threads {
        builder = builder.num_threads(count);
    }
    builder
        .build()
        .map_err(|e| GeomosaicError::Configuration(format!("failed to create thread pool: {}", e)))
}
