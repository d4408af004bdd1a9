//! GeoTIFF tag model.
//!
//! Maps between the raw GeoTIFF tags (model pixel scale, tiepoints, model
//! transformation, GeoKey directory and its parameter tags, GDAL nodata) and
//! the [`Georeference`] model.

use geo_common::{AffineTransform, Georeference, GroundControlPoint, SpatialReference};
use projection::CrsRegistry;

pub const MODEL_PIXEL_SCALE: u16 = 33550;
pub const MODEL_TIEPOINT: u16 = 33922;
pub const MODEL_TRANSFORMATION: u16 = 34264;
pub const GEO_KEY_DIRECTORY: u16 = 34735;
pub const GEO_DOUBLE_PARAMS: u16 = 34736;
pub const GEO_ASCII_PARAMS: u16 = 34737;
pub const GDAL_NODATA: u16 = 42113;

/// Tags that carry raster geometry.
pub const GEOMETRY_TAGS: [u16; 3] = [MODEL_PIXEL_SCALE, MODEL_TIEPOINT, MODEL_TRANSFORMATION];
/// Tags that carry the spatial reference.
pub const SRS_TAGS: [u16; 3] = [GEO_KEY_DIRECTORY, GEO_DOUBLE_PARAMS, GEO_ASCII_PARAMS];

// GeoKey ids
pub const GT_MODEL_TYPE: u16 = 1024;
pub const GT_RASTER_TYPE: u16 = 1025;
pub const GT_CITATION: u16 = 1026;
pub const GEOGRAPHIC_TYPE: u16 = 2048;
pub const GEOG_CITATION: u16 = 2049;
pub const PROJECTED_CS_TYPE: u16 = 3072;
pub const PCS_CITATION: u16 = 3073;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

const CRS_PREFIXES: [&str; 11] = [
    "PROJCS[",
    "GEOGCS[",
    "GEOCCS[",
    "COMPD_CS[",
    "LOCAL_CS[",
    "PROJCRS[",
    "GEOGCRS[",
    "GEODCRS[",
    "BOUNDCRS[",
    "COMPOUNDCRS[",
    "EPSG:",
];

/// A typed tag payload as written to the IFD.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Doubles(Vec<f64>),
    Shorts(Vec<u16>),
    Ascii(String),
}

/// One entry of the GeoKey directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoKey {
    pub id: u16,
    /// 0 for an inline SHORT value, otherwise the tag holding the value.
    pub location: u16,
    pub count: u16,
    /// Inline value or offset into the referenced tag.
    pub value: u16,
}

/// Parsed GeoKeyDirectoryTag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoKeyDirectory {
    pub version: [u16; 3],
    pub keys: Vec<GeoKey>,
}

impl Default for GeoKeyDirectory {
    fn default() -> Self {
        Self {
            version: [1, 1, 0],
            keys: Vec::new(),
        }
    }
}

impl GeoKeyDirectory {
    /// Parse the raw SHORT array. Returns `None` when the header or key count
    /// is inconsistent with the array length.
    pub fn parse(raw: &[u16]) -> Option<Self> {
        if raw.len() < 4 {
            return None;
        }
        let count = raw[3] as usize;
        let body = raw.get(4..4 + count * 4)?;
        let keys = body
            .chunks_exact(4)
            .map(|k| GeoKey {
                id: k[0],
                location: k[1],
                count: k[2],
                value: k[3],
            })
            .collect();
        Some(Self {
            version: [raw[0], raw[1], raw[2]],
            keys,
        })
    }

    pub fn get(&self, id: u16) -> Option<&GeoKey> {
        self.keys.iter().find(|k| k.id == id)
    }

    /// Inline SHORT value of a key.
    pub fn short(&self, id: u16) -> Option<u16> {
        self.get(id).filter(|k| k.location == 0).map(|k| k.value)
    }

    /// ASCII value of a key, sliced out of the GeoAsciiParams text.
    pub fn ascii<'a>(&self, id: u16, params: &'a str) -> Option<&'a str> {
        let key = self.get(id).filter(|k| k.location == GEO_ASCII_PARAMS)?;
        let start = key.value as usize;
        let text = params.get(start..start + key.count as usize)?;
        let text = text.trim_end_matches(['|', '\0']);
        (!text.is_empty()).then_some(text)
    }

    /// Insert or replace an inline SHORT key.
    pub fn set_short(&mut self, id: u16, value: u16) {
        self.set(GeoKey {
            id,
            location: 0,
            count: 1,
            value,
        });
    }

    pub fn set(&mut self, key: GeoKey) {
        match self.keys.iter_mut().find(|k| k.id == key.id) {
            Some(existing) => *existing = key,
            None => self.keys.push(key),
        }
    }

    /// Serialize, with keys sorted by id as GeoTIFF requires.
    pub fn to_vec(&self) -> Vec<u16> {
        let mut keys = self.keys.clone();
        keys.sort_by_key(|k| k.id);
        let mut out = Vec::with_capacity(4 + keys.len() * 4);
        out.extend_from_slice(&self.version);
        out.push(keys.len() as u16);
        for k in keys {
            out.extend_from_slice(&[k.id, k.location, k.count, k.value]);
        }
        out
    }
}

/// The GeoTIFF-related tags of one image, as stored on disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoTags {
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoints: Option<Vec<f64>>,
    pub transformation: Option<Vec<f64>>,
    pub geo_keys: Option<Vec<u16>>,
    pub geo_doubles: Option<Vec<f64>>,
    pub geo_ascii: Option<String>,
    pub nodata: Option<String>,
}

impl GeoTags {
    /// Encode a full georeference: geometry tags plus the spatial reference
    /// that positions the raster.
    pub fn from_georeference(georef: &Georeference, registry: &CrsRegistry) -> Self {
        let srs = if georef.transform.is_some() {
            &georef.projection
        } else {
            &georef.gcp_projection
        };
        Self::default().with_geometry(georef).with_srs(srs, registry)
    }

    /// Set the geometry tags. A north-up affine is stored as pixel scale plus a
    /// single tiepoint; a rotated one as a model transformation. GCPs are
    /// stored as tiepoints, in which case any affine goes to the model
    /// transformation.
    pub fn with_geometry(mut self, georef: &Georeference) -> Self {
        self.pixel_scale = None;
        self.tiepoints = None;
        self.transformation = None;

        if !georef.gcps.is_empty() {
            self.tiepoints = Some(
                georef
                    .gcps
                    .iter()
                    .flat_map(|g| [g.pixel, g.line, 0.0, g.x, g.y, g.z])
                    .collect(),
            );
            self.transformation = georef.transform.as_ref().map(model_transformation);
        } else if let Some(gt) = &georef.transform {
            if gt.is_north_up() && gt.pixel_width > 0.0 && gt.pixel_height < 0.0 {
                self.pixel_scale = Some(vec![gt.pixel_width, -gt.pixel_height, 0.0]);
                self.tiepoints = Some(vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0]);
            } else {
                self.transformation = Some(model_transformation(gt));
            }
        }
        self
    }

    /// Set the GeoKey directory for `srs`. The full text goes into the
    /// GTCitation key so it reads back unchanged; the EPSG key is added when
    /// the code can be identified. An empty reference clears the keys.
    pub fn with_srs(mut self, srs: &SpatialReference, registry: &CrsRegistry) -> Self {
        self.geo_keys = None;
        self.geo_doubles = None;
        self.geo_ascii = None;
        if srs.is_empty() {
            return self;
        }

        let text = srs.as_str();
        let geographic = match registry.resolve(text) {
            Ok(def) => def.is_geographic(),
            Err(_) => {
                let upper = text.trim_start().to_ascii_uppercase();
                upper.starts_with("GEOGCS[") || upper.starts_with("GEOGCRS[")
            }
        };

        let mut keys = GeoKeyDirectory::default();
        keys.set_short(
            GT_MODEL_TYPE,
            if geographic {
                MODEL_TYPE_GEOGRAPHIC
            } else {
                MODEL_TYPE_PROJECTED
            },
        );
        keys.set_short(GT_RASTER_TYPE, RASTER_PIXEL_IS_AREA);

        // Citation count includes the '|' terminator and must fit a SHORT
        if text.is_ascii() && text.len() < u16::MAX as usize && !text.contains('|') {
            keys.set(GeoKey {
                id: GT_CITATION,
                location: GEO_ASCII_PARAMS,
                count: (text.len() + 1) as u16,
                value: 0,
            });
            self.geo_ascii = Some(format!("{}|", text));
        }

        if let Some(code) = registry.identify_epsg(text) {
            let key = if geographic {
                GEOGRAPHIC_TYPE
            } else {
                PROJECTED_CS_TYPE
            };
            keys.set_short(key, code);
        }

        self.geo_keys = Some(keys.to_vec());
        self
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata.map(|v| v.to_string());
        self
    }

    /// The GDAL nodata value, when present and numeric.
    pub fn nodata_value(&self) -> Option<f64> {
        let text = self.nodata.as_deref()?.trim().trim_end_matches('\0');
        match text.to_ascii_lowercase().as_str() {
            "nan" => Some(f64::NAN),
            _ => text.parse().ok(),
        }
    }

    pub fn key_directory(&self) -> Option<GeoKeyDirectory> {
        self.geo_keys.as_deref().and_then(GeoKeyDirectory::parse)
    }

    /// Present tags in ascending code order.
    pub fn entries(&self) -> Vec<(u16, TagValue)> {
        let mut out = Vec::new();
        if let Some(v) = &self.pixel_scale {
            out.push((MODEL_PIXEL_SCALE, TagValue::Doubles(v.clone())));
        }
        if let Some(v) = &self.tiepoints {
            out.push((MODEL_TIEPOINT, TagValue::Doubles(v.clone())));
        }
        if let Some(v) = &self.transformation {
            out.push((MODEL_TRANSFORMATION, TagValue::Doubles(v.clone())));
        }
        if let Some(v) = &self.geo_keys {
            out.push((GEO_KEY_DIRECTORY, TagValue::Shorts(v.clone())));
        }
        if let Some(v) = &self.geo_doubles {
            out.push((GEO_DOUBLE_PARAMS, TagValue::Doubles(v.clone())));
        }
        if let Some(v) = &self.geo_ascii {
            out.push((GEO_ASCII_PARAMS, TagValue::Ascii(v.clone())));
        }
        if let Some(v) = &self.nodata {
            out.push((GDAL_NODATA, TagValue::Ascii(v.clone())));
        }
        out
    }

    /// Decode into a [`Georeference`] for a `width` x `height` raster.
    pub fn to_georeference(&self, width: u32, height: u32, registry: &CrsRegistry) -> Georeference {
        let mut georef = Georeference::unreferenced(width, height);
        let keys = self.key_directory();
        let pixel_is_point = keys
            .as_ref()
            .and_then(|k| k.short(GT_RASTER_TYPE))
            .map(|v| v == RASTER_PIXEL_IS_POINT)
            .unwrap_or(false);

        let tiepoints: Vec<&[f64]> = self
            .tiepoints
            .as_deref()
            .map(|t| t.chunks_exact(6).collect())
            .unwrap_or_default();
        let scale = self.pixel_scale.as_deref().filter(|s| s.len() >= 2);
        let transformation = self.transformation.as_deref().filter(|t| t.len() >= 16);

        let mut transform = match (transformation, scale, tiepoints.as_slice()) {
            (Some(t), _, _) => Some(AffineTransform::from_coefficients([
                t[3], t[0], t[1], t[7], t[4], t[5],
            ])),
            (None, Some(s), [tp]) => Some(AffineTransform::from_coefficients([
                tp[3] - tp[0] * s[0],
                s[0],
                0.0,
                tp[4] + tp[1] * s[1],
                0.0,
                -s[1],
            ])),
            _ => None,
        };
        let gcps_present = tiepoints.len() > 1 || (!tiepoints.is_empty() && scale.is_none());

        let half = if pixel_is_point { 0.5 } else { 0.0 };
        if let Some(gt) = transform.as_mut() {
            gt.origin_x -= half * gt.pixel_width + half * gt.row_rotation;
            gt.origin_y -= half * gt.column_rotation + half * gt.pixel_height;
        }
        georef.transform = transform;

        let srs = keys
            .as_ref()
            .map(|k| srs_from_keys(k, self.geo_ascii.as_deref(), registry))
            .unwrap_or_default();

        if gcps_present {
            georef.gcps = tiepoints
                .iter()
                .enumerate()
                .map(|(i, tp)| GroundControlPoint {
                    z: tp[5],
                    ..GroundControlPoint::new((i + 1).to_string(), tp[0] + half, tp[1] + half, tp[3], tp[4])
                })
                .collect();
            georef.gcp_projection = SpatialReference::new(srs.clone());
        }
        if georef.transform.is_some() {
            georef.projection = SpatialReference::new(srs);
        }

        if keys.is_some() || georef.has_reference() {
            let area_or_point = if pixel_is_point { "Point" } else { "Area" };
            georef
                .metadata
                .insert("AREA_OR_POINT".to_string(), area_or_point.to_string());
        }
        georef
    }
}

fn model_transformation(gt: &AffineTransform) -> Vec<f64> {
    vec![
        gt.pixel_width,
        gt.row_rotation,
        0.0,
        gt.origin_x,
        gt.column_rotation,
        gt.pixel_height,
        0.0,
        gt.origin_y,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    ]
}

fn looks_like_crs(text: &str) -> bool {
    let trimmed = text.trim_start();
    if trimmed.starts_with('+') {
        return true;
    }
    let upper = trimmed.to_ascii_uppercase();
    CRS_PREFIXES.iter().any(|p| upper.starts_with(p))
}

/// Spatial reference text from a GeoKey directory: a citation holding a full
/// CRS definition wins, then the EPSG code keys. Empty when neither is usable.
pub fn srs_from_keys(keys: &GeoKeyDirectory, ascii: Option<&str>, registry: &CrsRegistry) -> String {
    if let Some(params) = ascii {
        for id in [GT_CITATION, PCS_CITATION, GEOG_CITATION] {
            if let Some(text) = keys.ascii(id, params) {
                if looks_like_crs(text) {
                    return text.to_string();
                }
            }
        }
    }

    let code = [PROJECTED_CS_TYPE, GEOGRAPHIC_TYPE]
        .into_iter()
        .filter_map(|id| keys.short(id))
        .find(|&c| c != 0 && c != USER_DEFINED);

    match code {
        Some(code) => registry
            .lookup(code)
            .and_then(|def| def.wkt)
            .unwrap_or_else(|| format!("EPSG:{}", code)),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CrsRegistry {
        CrsRegistry::builtin()
    }

    #[test]
    fn test_key_directory_roundtrip() {
        let mut keys = GeoKeyDirectory::default();
        keys.set_short(GT_RASTER_TYPE, 1);
        keys.set_short(GT_MODEL_TYPE, 2);
        let raw = keys.to_vec();
        assert_eq!(raw, vec![1, 1, 0, 2, 1024, 0, 1, 2, 1025, 0, 1, 1]);

        let parsed = GeoKeyDirectory::parse(&raw).unwrap();
        assert_eq!(parsed.short(GT_MODEL_TYPE), Some(2));
        assert_eq!(parsed.short(GT_RASTER_TYPE), Some(1));
        assert_eq!(parsed.short(GT_CITATION), None);
    }

    #[test]
    fn test_key_directory_truncated() {
        assert!(GeoKeyDirectory::parse(&[1, 1, 0]).is_none());
        assert!(GeoKeyDirectory::parse(&[1, 1, 0, 2, 1024, 0, 1, 2]).is_none());
    }

    #[test]
    fn test_ascii_key() {
        let mut keys = GeoKeyDirectory::default();
        keys.set(GeoKey {
            id: PCS_CITATION,
            location: GEO_ASCII_PARAMS,
            count: 9,
            value: 4,
        });
        assert_eq!(keys.ascii(PCS_CITATION, "WGS|UTM zone|"), Some("UTM zone"));
        assert_eq!(keys.ascii(PCS_CITATION, "short"), None);
    }

    #[test]
    fn test_north_up_uses_scale_and_tiepoint() {
        let mut georef = Georeference::unreferenced(1000, 1000);
        georef.transform = Some(AffineTransform::north_up(-100.0, 0.0, 0.01, -0.01));
        georef.projection = SpatialReference::new("EPSG:4326");

        let tags = GeoTags::from_georeference(&georef, &registry());
        assert_eq!(tags.pixel_scale, Some(vec![0.01, 0.01, 0.0]));
        assert_eq!(tags.tiepoints, Some(vec![0.0, 0.0, 0.0, -100.0, 0.0, 0.0]));
        assert!(tags.transformation.is_none());

        let keys = tags.key_directory().unwrap();
        assert_eq!(keys.short(GT_MODEL_TYPE), Some(MODEL_TYPE_GEOGRAPHIC));
        assert_eq!(keys.short(GEOGRAPHIC_TYPE), Some(4326));
        assert_eq!(tags.geo_ascii.as_deref(), Some("EPSG:4326|"));
    }

    #[test]
    fn test_decode_roundtrip_rotated() {
        let mut georef = Georeference::unreferenced(10, 20);
        georef.transform = Some(AffineTransform::from_coefficients([500000.0, 10.0, 2.0, 4000000.0, 1.5, -10.0]));
        georef.projection = SpatialReference::new("EPSG:32633");

        let tags = GeoTags::from_georeference(&georef, &registry());
        assert!(tags.transformation.is_some());
        assert!(tags.pixel_scale.is_none());

        let decoded = tags.to_georeference(10, 20, &registry());
        assert_eq!(decoded.transform, georef.transform);
        assert_eq!(decoded.projection.as_str(), "EPSG:32633");
        assert_eq!(decoded.metadata.get("AREA_OR_POINT").map(String::as_str), Some("Area"));
    }

    #[test]
    fn test_decode_pixel_is_point_shift() {
        let mut keys = GeoKeyDirectory::default();
        keys.set_short(GT_RASTER_TYPE, RASTER_PIXEL_IS_POINT);
        let tags = GeoTags {
            pixel_scale: Some(vec![2.0, 2.0, 0.0]),
            tiepoints: Some(vec![0.0, 0.0, 0.0, 100.0, 200.0, 0.0]),
            geo_keys: Some(keys.to_vec()),
            ..Default::default()
        };
        let georef = tags.to_georeference(4, 4, &registry());
        let gt = georef.transform.unwrap();
        assert_eq!(gt.origin_x, 99.0);
        assert_eq!(gt.origin_y, 201.0);
        assert_eq!(georef.metadata.get("AREA_OR_POINT").map(String::as_str), Some("Point"));
    }

    #[test]
    fn test_decode_gcps() {
        let tags = GeoTags {
            tiepoints: Some(vec![
                0.0, 0.0, 0.0, 10.0, 50.0, 0.0, //
                100.0, 0.0, 0.0, 11.0, 50.0, 0.0, //
                0.0, 100.0, 0.0, 10.0, 49.0, 0.0,
            ]),
            ..Default::default()
        }
        .with_srs(&SpatialReference::new("EPSG:4326"), &registry());

        let georef = tags.to_georeference(100, 100, &registry());
        assert!(georef.transform.is_none());
        assert_eq!(georef.gcps.len(), 3);
        assert_eq!(georef.gcps[0].id, "1");
        assert_eq!(georef.gcps[2].y, 49.0);
        assert_eq!(georef.gcp_projection.as_str(), "EPSG:4326");
        assert!(georef.projection.is_empty());
    }

    #[test]
    fn test_srs_from_epsg_key_only() {
        let mut keys = GeoKeyDirectory::default();
        keys.set_short(PROJECTED_CS_TYPE, 3857);
        let srs = srs_from_keys(&keys, None, &registry());
        assert!(!srs.is_empty());

        let mut citation_only = GeoKeyDirectory::default();
        citation_only.set(GeoKey {
            id: GT_CITATION,
            location: GEO_ASCII_PARAMS,
            count: 9,
            value: 0,
        });
        assert_eq!(srs_from_keys(&citation_only, Some("my image|"), &registry()), "");
    }

    #[test]
    fn test_nodata_parsing() {
        let tags = GeoTags::default().with_nodata(Some(-9999.0));
        assert_eq!(tags.nodata.as_deref(), Some("-9999"));
        assert_eq!(tags.nodata_value(), Some(-9999.0));

        let nan = GeoTags {
            nodata: Some("nan\0".to_string()),
            ..Default::default()
        };
        assert!(nan.nodata_value().unwrap().is_nan());
    }
}
