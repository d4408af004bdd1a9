//! The georeference interchange document.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use geo_common::{
    AffineTransform, GeomosaicError, GeomosaicResult, Georeference, GroundControlPoint, SpatialReference,
};
use serde::{Deserialize, Serialize};

/// Format tag carried by every document this version writes and accepts.
pub const FORMAT_TAG: &str = "geomosaic_georef_v1";

/// Serialized georeferencing of one raster.
///
/// Everything but the format tag and raster size is optional: a raster may
/// carry an affine transform, GCPs, neither, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoreferenceDocument {
    #[serde(default)]
    pub format: String,

    /// Basename of the raster the document was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    /// `[width, height]` in pixels.
    #[serde(default)]
    pub raster_size: Vec<i64>,

    /// GDAL-ordered affine coefficients, or null.
    #[serde(default)]
    pub geotransform: Option<[f64; 6]>,

    #[serde(default)]
    pub projection_wkt: String,

    #[serde(default)]
    pub gcp_projection_wkt: String,

    #[serde(default)]
    pub gcps: Vec<GroundControlPoint>,

    /// Informational only; never written back to a raster.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl GeoreferenceDocument {
    pub fn from_georeference(georef: &Georeference, source_file: Option<String>) -> Self {
        Self {
            format: FORMAT_TAG.to_string(),
            source_file,
            raster_size: vec![georef.width as i64, georef.height as i64],
            geotransform: georef.transform.map(|gt| gt.coefficients()),
            projection_wkt: georef.projection.as_str().to_string(),
            gcp_projection_wkt: georef.gcp_projection.as_str().to_string(),
            gcps: georef.gcps.clone(),
            metadata: georef.metadata.clone(),
        }
    }

    /// Check the format tag and raster size. Returns `(width, height)`.
    pub fn validate(&self) -> GeomosaicResult<(u32, u32)> {
        if self.format != FORMAT_TAG {
            return Err(GeomosaicError::GeoreferenceFormat(format!(
                "unrecognized format '{}', expected '{}'",
                self.format, FORMAT_TAG
            )));
        }
        match self.raster_size.as_slice() {
            [w, h] if *w > 0 && *h > 0 && *w <= u32::MAX as i64 && *h <= u32::MAX as i64 => {
                Ok((*w as u32, *h as u32))
            }
            [_, _] => Err(GeomosaicError::GeoreferenceFormat(format!(
                "raster_size must be positive, got {:?}",
                self.raster_size
            ))),
            _ => Err(GeomosaicError::GeoreferenceFormat(
                "raster_size must be [width, height]".to_string(),
            )),
        }
    }

    /// The validated document as a [`Georeference`] (metadata excluded).
    pub fn to_georeference(&self) -> GeomosaicResult<Georeference> {
        let (width, height) = self.validate()?;
        Ok(Georeference {
            width,
            height,
            transform: self.geotransform.map(AffineTransform::from_coefficients),
            projection: SpatialReference::new(self.projection_wkt.clone()),
            gcps: self.gcps.clone(),
            gcp_projection: SpatialReference::new(self.gcp_projection_wkt.clone()),
            metadata: BTreeMap::new(),
        })
    }

    pub fn from_json(json: &str) -> GeomosaicResult<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn to_json_pretty(&self) -> GeomosaicResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a document from a JSON file.
    pub fn read(path: &Path) -> GeomosaicResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            GeomosaicError::GeoreferenceIo(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Write as pretty-printed JSON, creating parent directories.
    pub fn write(&self, path: &Path) -> GeomosaicResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                GeomosaicError::GeoreferenceIo(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let mut json = self.to_json_pretty()?;
        json.push('\n');
        fs::write(path, json).map_err(|e| {
            GeomosaicError::GeoreferenceIo(format!("cannot write {}: {}", path.display(), e))
        })
    }
}
