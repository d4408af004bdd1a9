//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use geo_common::Resampling;
use tiling::NodataPolicy;

#[derive(Parser, Debug)]
#[command(name = "geomosaic")]
#[command(about = "Cut georeferenced rasters into Web Mercator tile pyramids", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "GEOMOSAIC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "GEOMOSAIC_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Directory holding CRS definition overrides
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reproject a raster and cut it into a {z}/{x}/{y}.png pyramid
    Tile(TileArgs),

    /// Extract or embed georeferencing
    #[command(subcommand)]
    Georef(GeorefCommand),
}

#[derive(clap::Args, Debug)]
pub struct TileArgs {
    /// Source raster (GeoTIFF)
    pub input: PathBuf,

    /// Output directory for the pyramid
    pub output: PathBuf,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub min_zoom: i32,

    #[arg(long, default_value_t = 18, allow_negative_numbers = true)]
    pub max_zoom: i32,

    /// nearest, bilinear or cubic [default: bilinear or GEOMOSAIC_RESAMPLING]
    #[arg(long)]
    pub resampling: Option<Resampling>,

    /// Nodata handling: source, none or a value
    #[arg(long, default_value = "source", allow_hyphen_values = true)]
    pub nodata: NodataPolicy,

    /// Keep the reprojected raster in _cache/
    #[arg(long)]
    pub keep_intermediate: bool,

    /// Do not write fully transparent tiles
    #[arg(long)]
    pub exclude_transparent: bool,

    /// Worker threads [default: one per core or GEOMOSAIC_THREADS]
    #[arg(long)]
    pub threads: Option<usize>,

    /// Largest source accepted, in pixels; 0 for no limit [default: 268435456 or GEOMOSAIC_MAX_PIXELS]
    #[arg(long)]
    pub max_pixels: Option<u64>,

    /// Preview page title [default: input file name]
    #[arg(long)]
    pub title: Option<String>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum GeorefCommand {
    /// Write a raster's georeferencing to a JSON document
    Extract {
        /// Raster to read
        raster: PathBuf,

        /// Document path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy a raster and write a document's georeferencing into the copy
    Embed {
        /// Georeference document
        document: PathBuf,

        /// Raster to copy
        target: PathBuf,

        /// Path of the georeferenced copy
        output: PathBuf,
    },

    /// Print a human-readable summary of a document
    Show {
        /// Georeference document
        document: PathBuf,
    },
}
