//! CRS registry: resolves spatial reference text to a PROJ.4 definition.
//!
//! Lookups consult user overrides first (a PROJ-style `epsg` init file found
//! in the configured data directory), then the embedded EPSG database from
//! `crs-definitions`.
//!
//! Accepted spatial reference forms:
//! - `EPSG:<code>` (also `urn:ogc:def:crs:EPSG::<code>`)
//! - PROJ.4 strings (`+proj=...`)
//! - WKT1/WKT2 carrying an EPSG authority for the outermost CRS

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::transform::CrsTransformer;
use crate::ProjectionError;

/// Name of the overrides file looked up inside a data directory.
pub const OVERRIDES_FILE_NAME: &str = "epsg";

/// A resolved coordinate reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct CrsDefinition {
    /// EPSG code, when known.
    pub epsg: Option<u16>,
    /// PROJ.4 definition string.
    pub proj4: String,
    /// WKT from the embedded database, when available.
    pub wkt: Option<String>,
}

impl CrsDefinition {
    pub fn from_proj4(proj4: impl Into<String>) -> Self {
        Self {
            epsg: None,
            proj4: proj4.into(),
            wkt: None,
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        self.proj4.contains("+proj=longlat") || self.proj4.contains("+proj=latlong")
    }
}

/// EPSG lookup table with optional user overrides.
#[derive(Debug, Clone, Default)]
pub struct CrsRegistry {
    overrides: HashMap<u16, String>,
    source: Option<PathBuf>,
}

impl CrsRegistry {
    /// Registry backed by the embedded EPSG database only.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Registry that also reads `<data_dir>/epsg` when that file exists.
    pub fn from_data_dir(data_dir: &Path) -> Result<Self, ProjectionError> {
        let path = data_dir.join(OVERRIDES_FILE_NAME);
        if path.is_file() {
            Self::with_overrides_file(&path)
        } else {
            debug!(data_dir = %data_dir.display(), "No EPSG overrides file, using embedded definitions");
            Ok(Self::builtin())
        }
    }

    /// Load overrides from a PROJ init file (`<code> +proj=... <>` lines).
    pub fn with_overrides_file(path: &Path) -> Result<Self, ProjectionError> {
        let text = fs::read_to_string(path).map_err(|e| ProjectionError::DefinitionsFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let overrides = parse_init_file(&text).map_err(|message| ProjectionError::DefinitionsFile {
            path: path.to_path_buf(),
            message,
        })?;
        debug!(path = %path.display(), count = overrides.len(), "Loaded EPSG overrides");
        Ok(Self {
            overrides,
            source: Some(path.to_path_buf()),
        })
    }

    /// Path of the overrides file, if one was loaded.
    pub fn overrides_source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Look up an EPSG code.
    pub fn lookup(&self, code: u16) -> Option<CrsDefinition> {
        if let Some(proj4) = self.overrides.get(&code) {
            return Some(CrsDefinition {
                epsg: Some(code),
                proj4: proj4.clone(),
                wkt: None,
            });
        }
        crs_definitions::from_code(code).map(|def| CrsDefinition {
            epsg: Some(code),
            proj4: def.proj4.to_string(),
            wkt: Some(def.wkt.to_string()),
        })
    }

    /// Resolve spatial reference text into a definition.
    pub fn resolve(&self, srs: &str) -> Result<CrsDefinition, ProjectionError> {
        let text = srs.trim();
        if text.is_empty() {
            return Err(ProjectionError::UnknownCrs("empty spatial reference".to_string()));
        }

        if text.starts_with('+') || text.contains("+proj=") {
            return Ok(CrsDefinition::from_proj4(text));
        }

        let code = parse_epsg_code(text)
            .or_else(|| wkt_epsg_code(text))
            .ok_or_else(|| ProjectionError::UnknownCrs(abbreviate(text)))?;

        self.lookup(code)
            .ok_or_else(|| ProjectionError::UnknownCrs(format!("EPSG:{} is not in the registry", code)))
    }

    /// EPSG code of a spatial reference without resolving its definition.
    pub fn identify_epsg(&self, srs: &str) -> Option<u16> {
        let text = srs.trim();
        parse_epsg_code(text).or_else(|| wkt_epsg_code(text))
    }

    /// Verify that the registry can build and use EPSG:3857 and EPSG:4326.
    pub fn smoke_test(&self) -> Result<(), ProjectionError> {
        for code in [3857u16, 4326] {
            let def = self
                .lookup(code)
                .ok_or_else(|| ProjectionError::UnknownCrs(format!("EPSG:{}", code)))?;
            let transformer = CrsTransformer::new(&def)?;
            let (x, y) = transformer.from_lonlat(10.0, 20.0)?;
            if !x.is_finite() || !y.is_finite() {
                return Err(ProjectionError::TransformFailed(format!(
                    "EPSG:{} produced non-finite coordinates",
                    code
                )));
            }
        }
        Ok(())
    }
}

fn parse_init_file(text: &str) -> Result<HashMap<u16, String>, String> {
    let mut out = HashMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let rest = line
            .strip_prefix('<')
            .ok_or_else(|| format!("line {}: expected '<code>'", idx + 1))?;
        let close = rest
            .find('>')
            .ok_or_else(|| format!("line {}: unterminated code", idx + 1))?;
        let code: u16 = rest[..close]
            .trim()
            .parse()
            .map_err(|_| format!("line {}: invalid EPSG code '{}'", idx + 1, &rest[..close]))?;
        let definition = rest[close + 1..].trim();
        let definition = definition.strip_suffix("<>").unwrap_or(definition).trim();
        if definition.is_empty() {
            return Err(format!("line {}: empty definition for EPSG:{}", idx + 1, code));
        }
        out.insert(code, definition.to_string());
    }
    Ok(out)
}

fn parse_epsg_code(text: &str) -> Option<u16> {
    let upper = text.to_ascii_uppercase();
    let code = upper
        .strip_prefix("EPSG:")
        .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG::"))?;
    code.trim().parse().ok()
}

/// The last EPSG authority in a WKT string belongs to the outermost CRS.
fn wkt_epsg_code(text: &str) -> Option<u16> {
    let upper = text.to_ascii_uppercase();
    let patterns = ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","];
    let (pos, len) = patterns
        .iter()
        .filter_map(|p| upper.rfind(p).map(|pos| (pos, p.len())))
        .max_by_key(|(pos, _)| *pos)?;
    let tail = &upper[pos + len..];
    let digits: String = tail
        .trim_start_matches(|c: char| c == '"' || c.is_whitespace())
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn abbreviate(text: &str) -> String {
    const LIMIT: usize = 80;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}
