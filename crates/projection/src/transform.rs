//! Point transformation between a resolved CRS and WGS84 lon/lat.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::{CrsDefinition, ProjectionError};

const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Transforms points between one CRS and WGS84 lon/lat degrees.
///
/// proj4rs works in radians for geographic systems; this type converts at the
/// boundary so callers always see degrees.
pub struct CrsTransformer {
    source: Proj,
    wgs84: Proj,
    source_geographic: bool,
}

impl CrsTransformer {
    pub fn new(def: &CrsDefinition) -> Result<Self, ProjectionError> {
        let source = Proj::from_proj_string(&def.proj4).map_err(|e| {
            ProjectionError::InvalidDefinition {
                definition: def.proj4.clone(),
                message: format!("{:?}", e),
            }
        })?;
        let wgs84 = Proj::from_proj_string(WGS84_PROJ4).map_err(|e| {
            ProjectionError::InvalidDefinition {
                definition: WGS84_PROJ4.to_string(),
                message: format!("{:?}", e),
            }
        })?;
        Ok(Self {
            source,
            wgs84,
            source_geographic: def.is_geographic(),
        })
    }

    /// Source CRS coordinates to lon/lat degrees.
    pub fn to_lonlat(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.source, &self.wgs84, &mut point)
            .map_err(|e| ProjectionError::TransformFailed(format!("({}, {}): {:?}", x, y, e)))?;
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    }

    /// Lon/lat degrees to source CRS coordinates.
    pub fn from_lonlat(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        transform(&self.wgs84, &self.source, &mut point)
            .map_err(|e| ProjectionError::TransformFailed(format!("({}, {}): {:?}", lon, lat, e)))?;
        if self.source_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CrsRegistry;

    #[test]
    fn test_geographic_identity() {
        let def = CrsRegistry::builtin().lookup(4326).unwrap();
        let t = CrsTransformer::new(&def).unwrap();
        let (lon, lat) = t.to_lonlat(-100.0, -5.0).unwrap();
        assert!((lon - (-100.0)).abs() < 1e-9);
        assert!((lat - (-5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_utm_roundtrip() {
        let def = CrsRegistry::builtin().lookup(32633).unwrap();
        let t = CrsTransformer::new(&def).unwrap();
        let (x, y) = t.from_lonlat(15.0, 52.0).unwrap();
        assert!(x > 400000.0 && x < 600000.0, "easting {}", x);
        assert!(y > 5000000.0 && y < 6000000.0, "northing {}", y);
        let (lon, lat) = t.to_lonlat(x, y).unwrap();
        assert!((lon - 15.0).abs() < 1e-5);
        assert!((lat - 52.0).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_definition() {
        let def = CrsDefinition::from_proj4("+proj=doesnotexist");
        assert!(matches!(
            CrsTransformer::new(&def),
            Err(ProjectionError::InvalidDefinition { .. })
        ));
    }
}
