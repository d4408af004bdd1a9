//! Georeference model: affine transform, spatial reference text and ground control points.
//!
//! These types are the shared vocabulary of the raster reader/writer, the
//! georeference codec and the reprojection stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::BoundingBox;

/// Six-coefficient affine transform from pixel/line to projected coordinates.
///
/// Coefficients follow the GDAL ordering:
/// `x = origin_x + pixel * pixel_width + line * row_rotation`
/// `y = origin_y + pixel * column_rotation + line * pixel_height`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub column_rotation: f64,
    pub pixel_height: f64,
}

impl AffineTransform {
    /// North-up transform with square or rectangular pixels.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            column_rotation: 0.0,
            pixel_height,
        }
    }

    /// Build from coefficients in GDAL order.
    pub fn from_coefficients(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            column_rotation: c[4],
            pixel_height: c[5],
        }
    }

    /// Coefficients in GDAL order.
    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.column_rotation,
            self.pixel_height,
        ]
    }

    /// Map a pixel/line coordinate to projected coordinates.
    #[inline]
    pub fn apply(&self, pixel: f64, line: f64) -> (f64, f64) {
        (
            self.origin_x + pixel * self.pixel_width + line * self.row_rotation,
            self.origin_y + pixel * self.column_rotation + line * self.pixel_height,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.column_rotation
    }

    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det.is_finite() && det != 0.0 && self.coefficients().iter().all(|c| c.is_finite())
    }

    /// True when there is no rotation or shear.
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.column_rotation == 0.0
    }

    /// Inverse transform, mapping projected coordinates back to pixel/line.
    pub fn invert(&self) -> Option<AffineTransform> {
        if !self.is_invertible() {
            return None;
        }
        let det = self.determinant();
        Some(AffineTransform {
            origin_x: (self.row_rotation * self.origin_y - self.pixel_height * self.origin_x) / det,
            pixel_width: self.pixel_height / det,
            row_rotation: -self.row_rotation / det,
            origin_y: (self.column_rotation * self.origin_x - self.pixel_width * self.origin_y) / det,
            column_rotation: -self.column_rotation / det,
            pixel_height: self.pixel_width / det,
        })
    }

    /// Projected extent of a `width` x `height` raster.
    pub fn bounds(&self, width: u32, height: u32) -> BoundingBox {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(w, 0.0),
            self.apply(w, h),
            self.apply(0.0, h),
        ];
        let xs = corners.iter().map(|c| c.0);
        let ys = corners.iter().map(|c| c.1);
        BoundingBox::new(
            xs.clone().fold(f64::INFINITY, f64::min),
            ys.clone().fold(f64::INFINITY, f64::min),
            xs.fold(f64::NEG_INFINITY, f64::max),
            ys.fold(f64::NEG_INFINITY, f64::max),
        )
    }
}

/// Textual CRS definition (WKT, `EPSG:<code>` or a PROJ.4 string).
///
/// Equivalence at this layer is exact text match; an empty definition means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpatialReference(String);

impl SpatialReference {
    pub fn new(definition: impl Into<String>) -> Self {
        Self(definition.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpatialReference {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A pixel/line position tied to a coordinate in the GCP spatial reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundControlPoint {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub pixel: f64,
    #[serde(default)]
    pub line: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl GroundControlPoint {
    pub fn new(id: impl Into<String>, pixel: f64, line: f64, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            info: String::new(),
            pixel,
            line,
            x,
            y,
            z: 0.0,
        }
    }
}

/// Everything known about where a raster sits on the earth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Georeference {
    pub width: u32,
    pub height: u32,
    pub transform: Option<AffineTransform>,
    pub projection: SpatialReference,
    pub gcps: Vec<GroundControlPoint>,
    pub gcp_projection: SpatialReference,
    /// Informational key/value pairs read from the raster (e.g. `AREA_OR_POINT`).
    pub metadata: BTreeMap<String, String>,
}

impl Georeference {
    pub fn unreferenced(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// True when there is an affine transform or at least one GCP.
    pub fn has_reference(&self) -> bool {
        self.transform.is_some() || !self.gcps.is_empty()
    }

    /// The spatial reference that positions the raster: the primary one for an
    /// affine-referenced raster, the GCP one for a GCP-only raster.
    pub fn reference_srs(&self) -> &SpatialReference {
        if self.transform.is_some() || self.gcps.is_empty() {
            &self.projection
        } else {
            &self.gcp_projection
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_and_invert() {
        let gt = AffineTransform::from_coefficients([-100.0, 0.01, 0.0, 0.0, 0.0, -0.01]);
        assert_eq!(gt.apply(0.0, 0.0), (-100.0, 0.0));
        let (x, y) = gt.apply(1000.0, 1000.0);
        assert!((x - (-90.0)).abs() < 1e-9);
        assert!((y - (-10.0)).abs() < 1e-9);

        let inv = gt.invert().unwrap();
        let (p, l) = inv.apply(-95.0, -5.0);
        assert!((p - 500.0).abs() < 1e-6);
        assert!((l - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_invert_rotated() {
        let gt = AffineTransform::from_coefficients([10.0, 2.0, 0.5, 20.0, 0.25, -3.0]);
        let inv = gt.invert().unwrap();
        let (x, y) = gt.apply(7.0, 11.0);
        let (p, l) = inv.apply(x, y);
        assert!((p - 7.0).abs() < 1e-9);
        assert!((l - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_transform_not_invertible() {
        let gt = AffineTransform::from_coefficients([0.0, 0.0, 0.0, 0.0, 0.0, -1.0]);
        assert!(!gt.is_invertible());
        assert!(gt.invert().is_none());
    }

    #[test]
    fn test_bounds() {
        let gt = AffineTransform::north_up(-100.0, 0.0, 0.01, -0.01);
        let b = gt.bounds(1000, 1000);
        assert!((b.min_x - (-100.0)).abs() < 1e-9);
        assert!((b.max_x - (-90.0)).abs() < 1e-9);
        assert!((b.min_y - (-10.0)).abs() < 1e-9);
        assert!((b.max_y - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_reference_srs_prefers_primary_when_affine() {
        let mut georef = Georeference::unreferenced(10, 10);
        assert!(!georef.has_reference());

        georef.gcps.push(GroundControlPoint::new("1", 0.0, 0.0, 1.0, 2.0));
        georef.gcp_projection = SpatialReference::new("EPSG:4326");
        assert_eq!(georef.reference_srs().as_str(), "EPSG:4326");

        georef.transform = Some(AffineTransform::north_up(0.0, 0.0, 1.0, -1.0));
        georef.projection = SpatialReference::new("EPSG:3857");
        assert_eq!(georef.reference_srs().as_str(), "EPSG:3857");
    }
}
