//! Reprojection of georeferenced rasters to Web Mercator (EPSG:3857).

use std::borrow::Cow;
use std::time::Instant;

use geo_common::{AffineTransform, BoundingBox, Georeference, Resampling};
use projection::mercator::{lonlat_to_mercator, mercator_to_lonlat};
use projection::{fit_affine, CrsDefinition, CrsRegistry, CrsTransformer};
use rayon::prelude::*;
use renderer::RgbaView;
use tracing::{debug, info};

use crate::raster::Raster;
use crate::RasterError;

/// Points sampled along each edge when projecting the source footprint.
const EDGE_SAMPLES: usize = 20;
/// Columns between exactly transformed points in a row.
const APPROX_STRIDE: usize = 16;
/// Default tolerance (source pixels) for linear interpolation of a row segment.
pub const DEFAULT_MAX_ERROR: f64 = 0.125;

/// Resolved placement of a source raster: pixel/line to CRS affine plus the CRS.
#[derive(Debug, Clone)]
pub struct SourceReference {
    pub transform: AffineTransform,
    pub crs: CrsDefinition,
    /// True when the affine was fitted from ground control points.
    pub from_gcps: bool,
}

impl SourceReference {
    /// Resolve a georeference into something warpable. GCP-only rasters get a
    /// least-squares affine fit.
    pub fn resolve(georef: &Georeference, registry: &CrsRegistry) -> Result<Self, RasterError> {
        if !georef.has_reference() {
            return Err(RasterError::InvalidData(
                "raster has no geotransform and no ground control points".to_string(),
            ));
        }
        let crs = registry.resolve(georef.reference_srs().as_str())?;
        CrsTransformer::new(&crs)?;

        let (transform, from_gcps) = match georef.transform {
            Some(gt) => (gt, false),
            None => (fit_affine(&georef.gcps)?, true),
        };
        if !transform.is_invertible() {
            return Err(RasterError::InvalidData(
                "geotransform is not invertible".to_string(),
            ));
        }
        Ok(Self {
            transform,
            crs,
            from_gcps,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WarpOptions {
    pub resampling: Resampling,
    pub nodata: Option<f64>,
}

/// An RGBA raster in Web Mercator.
#[derive(Debug, Clone)]
pub struct WarpedRaster {
    pub raster: Raster,
    pub transform: AffineTransform,
}

impl WarpedRaster {
    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.raster.width, self.raster.height)
    }

    /// Ground size of one pixel in meters.
    pub fn resolution(&self) -> f64 {
        self.transform.pixel_width
    }

    pub fn rgba(&self) -> &[u8] {
        self.raster.as_u8().unwrap_or_default()
    }

    /// Georeference of the warped raster.
    pub fn georeference(&self) -> Georeference {
        Georeference {
            transform: Some(self.transform),
            projection: "EPSG:3857".into(),
            ..Georeference::unreferenced(self.raster.width, self.raster.height)
        }
    }
}

/// Reprojects a source raster into the tiling CRS.
pub trait Warper {
    fn warp(
        &self,
        source: &Raster,
        reference: &SourceReference,
        options: &WarpOptions,
    ) -> Result<WarpedRaster, RasterError>;
}

/// Warps into Web Mercator with square pixels, keeping roughly the source
/// pixel count.
#[derive(Debug, Clone, Copy)]
pub struct MercatorWarper {
    /// Maximum deviation, in source pixels, accepted when interpolating
    /// coordinates linearly between exactly transformed points.
    pub max_error: f64,
}

impl Default for MercatorWarper {
    fn default() -> Self {
        Self {
            max_error: DEFAULT_MAX_ERROR,
        }
    }
}

impl MercatorWarper {
    pub fn new(max_error: f64) -> Self {
        Self { max_error }
    }

    /// Mercator bounding box of the source footprint, from a densified boundary.
    pub fn footprint(&self, reference: &SourceReference, width: u32, height: u32) -> Result<BoundingBox, RasterError> {
        let transformer = CrsTransformer::new(&reference.crs)?;
        let (w, h) = (width as f64, height as f64);
        let mut edge = Vec::with_capacity((EDGE_SAMPLES + 1) * 4);
        for i in 0..=EDGE_SAMPLES {
            let t = i as f64 / EDGE_SAMPLES as f64;
            edge.extend_from_slice(&[(t * w, 0.0), (t * w, h), (0.0, t * h), (w, t * h)]);
        }

        let projected = edge.into_iter().filter_map(|(p, l)| {
            let (x, y) = reference.transform.apply(p, l);
            let (lon, lat) = transformer.to_lonlat(x, y).ok()?;
            Some(lonlat_to_mercator(lon, lat))
        });

        BoundingBox::from_points(projected)
            .filter(|b| !b.is_degenerate())
            .ok_or_else(|| RasterError::Warp("source footprint does not project into Web Mercator".to_string()))
    }
}

impl Warper for MercatorWarper {
    fn warp(
        &self,
        source: &Raster,
        reference: &SourceReference,
        options: &WarpOptions,
    ) -> Result<WarpedRaster, RasterError> {
        let start = Instant::now();
        let extent = self.footprint(reference, source.width, source.height)?;

        let resolution = (extent.width() * extent.height() / source.pixel_count() as f64).sqrt();
        let out_width = ((extent.width() / resolution) - 1e-6).ceil().max(1.0) as usize;
        let out_height = ((extent.height() / resolution) - 1e-6).ceil().max(1.0) as usize;
        let transform = AffineTransform::north_up(extent.min_x, extent.max_y, resolution, -resolution);

        info!(
            source_width = source.width,
            source_height = source.height,
            width = out_width,
            height = out_height,
            resolution_m = resolution,
            resampling = %options.resampling,
            from_gcps = reference.from_gcps,
            "Reprojecting to Web Mercator"
        );

        let inverse = reference
            .transform
            .invert()
            .ok_or_else(|| RasterError::InvalidData("geotransform is not invertible".to_string()))?;
        // 8-bit RGBA without nodata samples the same as its display rendition
        let display: Cow<'_, [u8]> = match source.as_u8() {
            Some(rgba) if source.bands == 4 && options.nodata.is_none() => Cow::Borrowed(rgba),
            _ => Cow::Owned(source.to_display_rgba(options.nodata)),
        };
        let view = RgbaView::new(&display, source.width as usize, source.height as usize)
            .ok_or_else(|| RasterError::InvalidData("display buffer size mismatch".to_string()))?;

        let grid = RowGrid {
            origin_x: extent.min_x,
            origin_y: extent.max_y,
            resolution,
            width: out_width,
            inverse,
            max_error: self.max_error,
        };

        let mut pixels = vec![0u8; out_width * out_height * 4];
        pixels
            .par_chunks_mut(out_width * 4)
            .enumerate()
            .for_each_init(
                || {
                    (
                        CrsTransformer::new(&reference.crs).ok(),
                        vec![None::<(f64, f64)>; out_width],
                    )
                },
                |(transformer, coords), (row, chunk)| {
                    let Some(transformer) = transformer.as_ref() else {
                        return;
                    };
                    grid.source_coords(transformer, row, coords);
                    for (px, coord) in chunk.chunks_exact_mut(4).zip(coords.iter()) {
                        if let Some((x, y)) = *coord {
                            px.copy_from_slice(&view.sample(x, y, options.resampling));
                        }
                    }
                },
            );

        let raster = Raster::from_u8(out_width as u32, out_height as u32, 4, pixels)?;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Reprojection complete"
        );
        Ok(WarpedRaster { raster, transform })
    }
}

/// Maps output rows back to continuous source pixel coordinates.
struct RowGrid {
    origin_x: f64,
    origin_y: f64,
    resolution: f64,
    width: usize,
    inverse: AffineTransform,
    max_error: f64,
}

impl RowGrid {
    fn exact(&self, transformer: &CrsTransformer, col: usize, my: f64) -> Option<(f64, f64)> {
        let mx = self.origin_x + (col as f64 + 0.5) * self.resolution;
        let (lon, lat) = mercator_to_lonlat(mx, my);
        let (sx, sy) = transformer.from_lonlat(lon, lat).ok()?;
        let (px, py) = self.inverse.apply(sx, sy);
        (px.is_finite() && py.is_finite()).then_some((px, py))
    }

    /// Fill `coords` for one row. Exact transforms are taken every
    /// `APPROX_STRIDE` columns; segments whose midpoint stays within
    /// `max_error` of the linear estimate are interpolated, others are
    /// transformed per column.
    fn source_coords(&self, transformer: &CrsTransformer, row: usize, coords: &mut [Option<(f64, f64)>]) {
        let my = self.origin_y - (row as f64 + 0.5) * self.resolution;
        let last = self.width - 1;
        let mut start = 0;
        let mut a = self.exact(transformer, 0, my);

        while start < last {
            let end = (start + APPROX_STRIDE).min(last);
            let b = self.exact(transformer, end, my);
            let span = (end - start) as f64;

            let linear = match (a, b) {
                (Some(pa), Some(pb)) if end - start > 1 => {
                    let mid = (start + end) / 2;
                    self.exact(transformer, mid, my)
                        .map(|pm| {
                            let (lx, ly) = lerp(pa, pb, (mid - start) as f64 / span);
                            (lx - pm.0).abs() <= self.max_error && (ly - pm.1).abs() <= self.max_error
                        })
                        .unwrap_or(false)
                        .then_some((pa, pb))
                }
                _ => None,
            };

            coords[start] = a;
            for (col, coord) in coords.iter_mut().enumerate().take(end).skip(start + 1) {
                *coord = match linear {
                    Some((pa, pb)) => Some(lerp(pa, pb, (col - start) as f64 / span)),
                    None => self.exact(transformer, col, my),
                };
            }
            a = b;
            start = end;
        }
        coords[last] = a;
    }
}

#[inline]
fn lerp(a: (f64, f64), b: (f64, f64), t: f64) -> (f64, f64) {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_common::{GroundControlPoint, SpatialReference};

    fn geographic_georef(width: u32, height: u32) -> Georeference {
        Georeference {
            transform: Some(AffineTransform::north_up(-100.0, 0.0, 0.01, -0.01)),
            projection: SpatialReference::new("EPSG:4326"),
            ..Georeference::unreferenced(width, height)
        }
    }

    #[test]
    fn test_resolve_requires_reference() {
        let registry = CrsRegistry::builtin();
        let err = SourceReference::resolve(&Georeference::unreferenced(10, 10), &registry).unwrap_err();
        assert!(matches!(err, RasterError::InvalidData(_)));
    }

    #[test]
    fn test_resolve_unknown_crs() {
        let registry = CrsRegistry::builtin();
        let mut georef = geographic_georef(10, 10);
        georef.projection = SpatialReference::new("EPSG:1");
        let err = SourceReference::resolve(&georef, &registry).unwrap_err();
        assert!(matches!(err, RasterError::Projection(_)));
    }

    #[test]
    fn test_resolve_fits_gcps() {
        let registry = CrsRegistry::builtin();
        let georef = Georeference {
            gcps: vec![
                GroundControlPoint::new("1", 0.0, 0.0, 10.0, 50.0),
                GroundControlPoint::new("2", 100.0, 0.0, 11.0, 50.0),
                GroundControlPoint::new("3", 0.0, 100.0, 10.0, 49.0),
            ],
            gcp_projection: SpatialReference::new("EPSG:4326"),
            ..Georeference::unreferenced(100, 100)
        };
        let reference = SourceReference::resolve(&georef, &registry).unwrap();
        assert!(reference.from_gcps);
        assert!((reference.transform.pixel_width - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_footprint_matches_mercator_bounds() {
        let registry = CrsRegistry::builtin();
        let reference = SourceReference::resolve(&geographic_georef(1000, 1000), &registry).unwrap();
        let bbox = MercatorWarper::default().footprint(&reference, 1000, 1000).unwrap();

        let (min_x, min_y) = lonlat_to_mercator(-100.0, -10.0);
        let (max_x, max_y) = lonlat_to_mercator(-90.0, 0.0);
        assert!((bbox.min_x - min_x).abs() < 1e-3);
        assert!((bbox.min_y - min_y).abs() < 1e-3);
        assert!((bbox.max_x - max_x).abs() < 1e-3);
        assert!(bbox.max_y.abs() < 1e-3);
        assert!(max_y.abs() < 1e-9);
    }

    #[test]
    fn test_warp_solid_raster() {
        let registry = CrsRegistry::builtin();
        let georef = geographic_georef(50, 50);
        let reference = SourceReference::resolve(&georef, &registry).unwrap();
        let source = Raster::from_u8(50, 50, 3, vec![200; 50 * 50 * 3]).unwrap();

        let warped = MercatorWarper::default()
            .warp(&source, &reference, &WarpOptions::default())
            .unwrap();

        assert_eq!(warped.raster.bands, 4);
        let pixels = warped.rgba();
        let w = warped.raster.width as usize;
        let h = warped.raster.height as usize;
        // Interior pixel is fully opaque source colour
        let center = ((h / 2) * w + w / 2) * 4;
        assert_eq!(&pixels[center..center + 4], &[200, 200, 200, 255]);
        // Pixel count is preserved within rounding
        let count = (w * h) as f64;
        assert!((count - 2500.0).abs() / 2500.0 < 0.1);
        assert!((warped.resolution() - warped.transform.pixel_width).abs() < f64::EPSILON);
    }

    #[test]
    fn test_warp_respects_nodata() {
        let registry = CrsRegistry::builtin();
        let reference = SourceReference::resolve(&geographic_georef(20, 20), &registry).unwrap();
        let source = Raster::from_u8(20, 20, 1, vec![0; 400]).unwrap();
        let options = WarpOptions {
            nodata: Some(0.0),
            ..Default::default()
        };
        let warped = MercatorWarper::default().warp(&source, &reference, &options).unwrap();
        assert!(warped.rgba().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_row_interpolation_matches_exact() {
        let registry = CrsRegistry::builtin();
        let crs = registry.resolve("EPSG:4326").unwrap();
        let transformer = CrsTransformer::new(&crs).unwrap();
        let inverse = AffineTransform::north_up(-100.0, 0.0, 0.01, -0.01).invert().unwrap();
        let (ox, oy) = lonlat_to_mercator(-100.0, 0.0);
        let grid = RowGrid {
            origin_x: ox,
            origin_y: oy,
            resolution: 1000.0,
            width: 40,
            inverse,
            max_error: DEFAULT_MAX_ERROR,
        };

        let mut coords = vec![None; 40];
        grid.source_coords(&transformer, 3, &mut coords);
        let my = oy - 3.5 * 1000.0;
        for (col, coord) in coords.iter().enumerate() {
            let exact = grid.exact(&transformer, col, my).unwrap();
            let (x, y) = coord.unwrap();
            assert!((x - exact.0).abs() <= DEFAULT_MAX_ERROR);
            assert!((y - exact.1).abs() <= DEFAULT_MAX_ERROR);
        }
    }
}
