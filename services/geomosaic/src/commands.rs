//! Subcommand handlers.

use std::io::Write;

use anyhow::{Context, Result};
use geo_common::GeomosaicError;
use georef::{embed, extract, summarize, GeoreferenceDocument};
use tiling::{run, RuntimeConfig, TilingConfig, TilingJob};
use tracing::info;

use crate::cli::{GeorefCommand, TileArgs};

pub fn tile(args: TileArgs, runtime: &RuntimeConfig) -> Result<()> {
    let config = TilingConfig::from_env();
    config.validate().map_err(GeomosaicError::Configuration)?;

    let mut job = TilingJob::new(&args.input, &args.output)
        .with_config(&config)
        .with_zoom(args.min_zoom, args.max_zoom)
        .with_nodata(args.nodata)
        .keep_intermediate(args.keep_intermediate);
    if let Some(resampling) = args.resampling {
        job = job.with_resampling(resampling);
    }
    if args.exclude_transparent {
        job = job.exclude_transparent(true);
    }
    if args.threads.is_some() {
        job = job.with_threads(args.threads);
    }
    if let Some(limit) = args.max_pixels {
        job = job.with_max_source_pixels((limit > 0).then_some(limit));
    }
    if let Some(title) = args.title {
        job = job.with_title(title);
    }

    let report = run(&job, runtime)?;

    let mut out = std::io::stdout().lock();
    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        writeln!(
            out,
            "Wrote {} tiles ({} skipped) for zoom {}..{} to {}",
            report.tiles_written,
            report.tiles_skipped,
            report.min_zoom,
            report.max_zoom,
            report.output_dir.display()
        )?;
        writeln!(
            out,
            "Bounds: west {:.6}, south {:.6}, east {:.6}, north {:.6}",
            report.bounds.min_x, report.bounds.min_y, report.bounds.max_x, report.bounds.max_y
        )?;
        if let Some(zoom) = report.suggested_max_zoom {
            writeln!(out, "Suggested max zoom: {}", zoom)?;
        }
        writeln!(out, "Preview: {}", report.preview.display())?;
        if let Some(path) = &report.intermediate {
            writeln!(out, "Intermediate: {}", path.display())?;
        }
    }
    Ok(())
}

pub fn georef(command: GeorefCommand, runtime: &RuntimeConfig) -> Result<()> {
    match command {
        GeorefCommand::Extract { raster, output } => {
            let doc = extract(&raster, &runtime.registry)?;
            match output {
                Some(path) => {
                    doc.write(&path)?;
                    info!(path = %path.display(), "Georeference document written");
                }
                None => {
                    let json = doc.to_json_pretty()?;
                    writeln!(std::io::stdout().lock(), "{}", json)?;
                }
            }
        }
        GeorefCommand::Embed {
            document,
            target,
            output,
        } => {
            let doc = GeoreferenceDocument::read(&document)?;
            let report = embed(&doc, &target, &output, &runtime.registry)?;
            writeln!(
                std::io::stdout().lock(),
                "Wrote {} (geometry: {}, spatial reference: {})",
                report.output.display(),
                yes_no(report.wrote_geometry),
                yes_no(report.wrote_srs)
            )?;
        }
        GeorefCommand::Show { document } => {
            let doc = GeoreferenceDocument::read(&document)
                .with_context(|| format!("while showing {}", document.display()))?;
            write!(std::io::stdout().lock(), "{}", summarize(&doc))?;
        }
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
