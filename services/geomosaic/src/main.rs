//! GeoMosaic command-line front end.
//!
//! `geomosaic tile` turns a georeferenced raster into a Web Mercator tile
//! pyramid with a Leaflet preview; `geomosaic georef` moves georeferencing
//! between rasters through a JSON document.

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use geo_common::GeomosaicError;
use tiling::RuntimeConfig;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, LogFormat};

/// Exit status for failures outside the error taxonomy.
const EXIT_OTHER: u8 = 1;

fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let taxonomy = err.chain().find_map(|e| e.downcast_ref::<GeomosaicError>());
            let kind = taxonomy.map(GeomosaicError::kind).unwrap_or("Error");
            error!(kind = kind, error = %format!("{:#}", err), "Command failed");
            eprintln!("error[{}]: {:#}", kind, err);
            let code = taxonomy
                .and_then(|e| u8::try_from(e.exit_code()).ok())
                .unwrap_or(EXIT_OTHER);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let runtime = RuntimeConfig::resolve(cli.data_dir.as_deref())?;
    debug!(data_dir = ?runtime.data_dir, "Runtime ready");

    match cli.command {
        Command::Tile(args) => commands::tile(args, &runtime),
        Command::Georef(command) => commands::georef(command, &runtime),
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // stdout carries command output only
    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("failed to initialize logging: {}", e);
    }
}
