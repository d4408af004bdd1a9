//! Tiling job description and validation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use geo_common::{GeomosaicError, GeomosaicResult, Resampling};
use serde::{Deserialize, Serialize};

use crate::config::TilingConfig;

/// Deepest zoom level accepted for a job.
pub const MAX_ZOOM_LIMIT: i32 = 24;

/// Default zoom range of a new job.
pub const DEFAULT_MIN_ZOOM: i32 = 0;
pub const DEFAULT_MAX_ZOOM: i32 = 18;

/// Default source size limit, in pixels.
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 1 << 28;

/// How source nodata is treated during reprojection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodataPolicy {
    /// Use the nodata value declared by the source raster, if any.
    #[default]
    FromSource,
    /// Treat this value as nodata regardless of the source.
    Value(f64),
    /// Every pixel inside the footprint is valid.
    Disabled,
}

impl NodataPolicy {
    /// Nodata value to apply given what the source declares.
    pub fn resolve(&self, declared: Option<f64>) -> Option<f64> {
        match self {
            NodataPolicy::FromSource => declared,
            NodataPolicy::Value(v) => Some(*v),
            NodataPolicy::Disabled => None,
        }
    }
}

impl FromStr for NodataPolicy {
    type Err = String;

    /// `source`, `none` or a number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "source" | "auto" => Ok(NodataPolicy::FromSource),
            "none" | "off" | "disabled" => Ok(NodataPolicy::Disabled),
            other => other
                .parse::<f64>()
                .map(NodataPolicy::Value)
                .map_err(|_| format!("invalid nodata '{}', expected source, none or a number", s)),
        }
    }
}

impl fmt::Display for NodataPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodataPolicy::FromSource => f.write_str("source"),
            NodataPolicy::Value(v) => write!(f, "{}", v),
            NodataPolicy::Disabled => f.write_str("none"),
        }
    }
}

/// One run of the tiling pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingJob {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub min_zoom: i32,
    pub max_zoom: i32,
    pub nodata: NodataPolicy,
    pub resampling: Resampling,
    /// Keep the reprojected raster in the cache directory after success.
    pub keep_intermediate: bool,
    /// Do not write tiles without a single opaque pixel.
    pub exclude_transparent: bool,
    /// Worker threads, `None` for one per core.
    pub threads: Option<usize>,
    /// Title of the preview page.
    pub title: String,
    /// Largest source accepted, in pixels; `None` for no limit. The decoded
    /// source, its RGBA rendition and the warped raster are held in memory.
    #[serde(default)]
    pub max_source_pixels: Option<u64>,
}

impl TilingJob {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let input = input.into();
        let title = default_title(&input);
        Self {
            input,
            output_dir: output_dir.into(),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            nodata: NodataPolicy::default(),
            resampling: Resampling::default(),
            keep_intermediate: false,
            exclude_transparent: false,
            threads: None,
            title,
            max_source_pixels: Some(DEFAULT_MAX_SOURCE_PIXELS),
        }
    }

    pub fn with_zoom(mut self, min_zoom: i32, max_zoom: i32) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = resampling;
        self
    }

    pub fn with_nodata(mut self, nodata: NodataPolicy) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn keep_intermediate(mut self, keep: bool) -> Self {
        self.keep_intermediate = keep;
        self
    }

    pub fn exclude_transparent(mut self, exclude: bool) -> Self {
        self.exclude_transparent = exclude;
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_max_source_pixels(mut self, limit: Option<u64>) -> Self {
        self.max_source_pixels = limit;
        self
    }

    /// Apply configured defaults for the knobs a caller did not set.
    pub fn with_config(mut self, config: &TilingConfig) -> Self {
        self.resampling = config.resampling;
        self.exclude_transparent = config.exclude_transparent;
        self.threads = config.threads;
        self.max_source_pixels = config.max_source_pixels;
        self
    }

    /// Zoom levels as unsigned tile zooms. Only meaningful after `validate`.
    pub fn zoom_range(&self) -> (u32, u32) {
        (self.min_zoom.max(0) as u32, self.max_zoom.max(0) as u32)
    }

    /// Reject a source larger than `max_source_pixels`. Checked once the
    /// source header is read, before any output is created.
    pub fn check_source_size(&self, width: u32, height: u32) -> GeomosaicResult<()> {
        let pixels = width as u64 * height as u64;
        match self.max_source_pixels {
            Some(limit) if pixels > limit => Err(invalid(format!(
                "source is {}x{} ({} pixels), above the limit of {} pixels",
                width, height, pixels, limit
            ))),
            _ => Ok(()),
        }
    }

    /// Check the job without touching the filesystem.
    pub fn validate(&self) -> GeomosaicResult<()> {
        if self.input.as_os_str().is_empty() {
            return Err(invalid("no input raster given"));
        }
        if !self.input.exists() {
            return Err(invalid(format!("input raster not found: {}", self.input.display())));
        }
        if !self.input.is_file() {
            return Err(invalid(format!("input is not a file: {}", self.input.display())));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(invalid("no output directory given"));
        }
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(invalid(format!(
                "output path exists and is not a directory: {}",
                self.output_dir.display()
            )));
        }
        if self.min_zoom < 0 || self.max_zoom < 0 {
            return Err(invalid(format!(
                "zoom levels must be >= 0, got {}..{}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.min_zoom > self.max_zoom {
            return Err(invalid(format!(
                "min zoom {} is greater than max zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.max_zoom > MAX_ZOOM_LIMIT {
            return Err(invalid(format!(
                "max zoom {} exceeds the limit of {}",
                self.max_zoom, MAX_ZOOM_LIMIT
            )));
        }
        if self.threads == Some(0) {
            return Err(invalid("thread count must be > 0"));
        }
        Ok(())
    }
}

fn default_title(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "GeoMosaic".to_string())
}

fn invalid(message: impl Into<String>) -> GeomosaicError {
    GeomosaicError::InputValidation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_in(dir: &Path) -> TilingJob {
        let input = dir.join("input.tif");
        std::fs::write(&input, b"not checked here").unwrap();
        TilingJob::new(input, dir.join("tiles"))
    }

    #[test]
    fn test_defaults() {
        let job = TilingJob::new("/data/scan.tif", "/tmp/out");
        assert_eq!(job.min_zoom, 0);
        assert_eq!(job.max_zoom, 18);
        assert_eq!(job.title, "scan.tif");
        assert_eq!(job.resampling, Resampling::Bilinear);
        assert_eq!(job.nodata, NodataPolicy::FromSource);
        assert!(!job.keep_intermediate);
        assert!(!job.exclude_transparent);
    }

    #[test]
    fn test_valid_job() {
        let dir = tempfile::tempdir().unwrap();
        assert!(job_in(dir.path()).with_zoom(0, 24).validate().is_ok());
    }

    #[test]
    fn test_zoom_errors() {
        let dir = tempfile::tempdir().unwrap();
        for (min, max) in [(-1, 2), (0, -1), (5, 4), (0, 25)] {
            let err = job_in(dir.path()).with_zoom(min, max).validate().unwrap_err();
            assert_eq!(err.kind(), "InputValidationError", "{}..{}", min, max);
        }
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let job = TilingJob::new(dir.path().join("missing.tif"), dir.path().join("out"));
        assert_eq!(job.validate().unwrap_err().kind(), "InputValidationError");
    }

    #[test]
    fn test_output_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_in(dir.path());
        job.output_dir = job.input.clone();
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_validate_does_not_create_output() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_in(dir.path());
        job.validate().unwrap();
        assert!(!job.output_dir.exists());
    }

    #[test]
    fn test_zero_threads() {
        let dir = tempfile::tempdir().unwrap();
        assert!(job_in(dir.path()).with_threads(Some(0)).validate().is_err());
    }

    #[test]
    fn test_source_size_limit() {
        let job = TilingJob::new("/data/scan.tif", "/tmp/out").with_max_source_pixels(Some(100));
        assert!(job.check_source_size(10, 10).is_ok());
        let err = job.check_source_size(10, 11).unwrap_err();
        assert_eq!(err.kind(), "InputValidationError");
        assert!(err.to_string().contains("110 pixels"));

        let unlimited = job.with_max_source_pixels(None);
        assert!(unlimited.check_source_size(u32::MAX, u32::MAX).is_ok());
        assert_eq!(
            TilingJob::new("a.tif", "out").max_source_pixels,
            Some(DEFAULT_MAX_SOURCE_PIXELS)
        );
    }

    #[test]
    fn test_nodata_policy() {
        assert_eq!("source".parse::<NodataPolicy>().unwrap(), NodataPolicy::FromSource);
        assert_eq!("none".parse::<NodataPolicy>().unwrap(), NodataPolicy::Disabled);
        assert_eq!("-9999".parse::<NodataPolicy>().unwrap(), NodataPolicy::Value(-9999.0));
        assert!("abc".parse::<NodataPolicy>().is_err());

        assert_eq!(NodataPolicy::FromSource.resolve(Some(0.0)), Some(0.0));
        assert_eq!(NodataPolicy::Value(255.0).resolve(Some(0.0)), Some(255.0));
        assert_eq!(NodataPolicy::Disabled.resolve(Some(0.0)), None);
    }
}
