//! Configuration for tiling runs.

use std::env;
use std::path::{Path, PathBuf};

use geo_common::{GeomosaicError, GeomosaicResult, Resampling};
use projection::CrsRegistry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::job::DEFAULT_MAX_SOURCE_PIXELS;

/// Environment variables consulted, in order, for the data directory.
/// The first is ours and must point at an existing directory; the PROJ ones
/// are shared with other tools and skipped when they do not exist.
pub const DATA_DIR_ENV_VARS: [&str; 3] = ["GEOMOSAIC_DATA_DIR", "PROJ_DATA", "PROJ_LIB"];

/// Defaults applied to tiling jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingConfig {
    /// Resampling used for reprojection and tile cutting.
    pub resampling: Resampling,

    /// Worker threads; `None` means one per core.
    pub threads: Option<usize>,

    /// Skip writing tiles with no opaque pixel.
    pub exclude_transparent: bool,

    /// Largest source accepted, in pixels; `None` for no limit.
    pub max_source_pixels: Option<u64>,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            resampling: Resampling::Bilinear,
            threads: None,
            exclude_transparent: false,
            max_source_pixels: Some(DEFAULT_MAX_SOURCE_PIXELS),
        }
    }
}

impl TilingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from a variable lookup. Unparsable values keep
    /// the default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("GEOMOSAIC_RESAMPLING") {
            match val.parse() {
                Ok(method) => config.resampling = method,
                Err(e) => warn!(value = %val, error = %e, "Ignoring GEOMOSAIC_RESAMPLING"),
            }
        }

        if let Some(val) = lookup("GEOMOSAIC_THREADS") {
            match val.trim().parse::<usize>() {
                Ok(threads) => config.threads = Some(threads),
                Err(e) => warn!(value = %val, error = %e, "Ignoring GEOMOSAIC_THREADS"),
            }
        }

        if let Some(val) = lookup("GEOMOSAIC_EXCLUDE_TRANSPARENT") {
            match val.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => config.exclude_transparent = true,
                "false" | "0" | "no" => config.exclude_transparent = false,
                _ => warn!(value = %val, "Ignoring GEOMOSAIC_EXCLUDE_TRANSPARENT"),
            }
        }

        // 0 lifts the limit
        if let Some(val) = lookup("GEOMOSAIC_MAX_PIXELS") {
            match val.trim().parse::<u64>() {
                Ok(0) => config.max_source_pixels = None,
                Ok(limit) => config.max_source_pixels = Some(limit),
                Err(e) => warn!(value = %val, error = %e, "Ignoring GEOMOSAIC_MAX_PIXELS"),
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.threads == Some(0) {
            return Err("threads must be > 0".to_string());
        }
        Ok(())
    }
}

/// Process-wide environment resolved once at startup and passed down
/// explicitly.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_dir: Option<PathBuf>,
    pub registry: CrsRegistry,
}

impl RuntimeConfig {
    /// Resolve the data directory from `explicit` or the environment, load
    /// the CRS registry from it and smoke-test EPSG:3857 and EPSG:4326.
    pub fn resolve(explicit: Option<&Path>) -> GeomosaicResult<Self> {
        let data_dir = resolve_data_dir(explicit, |key| env::var(key).ok())?;
        let registry = match &data_dir {
            Some(dir) => CrsRegistry::from_data_dir(dir).map_err(|e| {
                GeomosaicError::Configuration(format!("cannot load CRS overrides: {}", e))
            })?,
            None => CrsRegistry::builtin(),
        };
        registry
            .smoke_test()
            .map_err(|e| GeomosaicError::Configuration(format!("CRS registry smoke test failed: {}", e)))?;

        info!(
            data_dir = ?data_dir,
            overrides = ?registry.overrides_source(),
            "Runtime configuration resolved"
        );
        Ok(Self { data_dir, registry })
    }

    /// Resolve from the environment only.
    pub fn from_env() -> GeomosaicResult<Self> {
        Self::resolve(None)
    }

    /// Configuration around an already built registry.
    pub fn with_registry(registry: CrsRegistry) -> Self {
        Self {
            data_dir: None,
            registry,
        }
    }
}

fn resolve_data_dir(
    explicit: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> GeomosaicResult<Option<PathBuf>> {
    if let Some(dir) = explicit {
        return require_dir(dir, "--data-dir").map(Some);
    }

    for (i, key) in DATA_DIR_ENV_VARS.iter().enumerate() {
        let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        // PROJ_LIB and friends may hold a path list
        let first = env::split_paths(&value).next().unwrap_or_else(|| PathBuf::from(&value));
        if i == 0 {
            return require_dir(&first, key).map(Some);
        }
        if first.is_dir() {
            debug!(source = key, path = %first.display(), "Using data directory");
            return Ok(Some(first));
        }
        warn!(source = key, path = %first.display(), "Data directory does not exist, ignoring");
    }
    Ok(None)
}

fn require_dir(dir: &Path, source: &str) -> GeomosaicResult<PathBuf> {
    if dir.is_dir() {
        Ok(dir.to_path_buf())
    } else {
        Err(GeomosaicError::Configuration(format!(
            "data directory from {} does not exist: {}",
            source,
            dir.display()
        )))
    }
}
