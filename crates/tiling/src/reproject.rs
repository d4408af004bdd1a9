//! Reprojection stage: source raster to an RGBA Web Mercator intermediate.

use std::path::{Path, PathBuf};
use std::time::Instant;

use geo_common::tile::suggested_max_zoom;
use geo_common::{BoundingBox, GeomosaicError, GeomosaicResult, Resampling};
use projection::mercator::mercator_bbox_to_lonlat;
use projection::CrsRegistry;
use raster_io::{
    read_geotiff, read_info, write_geotiff, GeoTags, GeoTiffInfo, RasterError, SourceReference,
    WarpOptions, WarpedRaster, Warper,
};
use tracing::{debug, info};

use crate::job::NodataPolicy;

/// A source raster whose georeferencing has been checked and resolved.
#[derive(Debug, Clone)]
pub struct PreparedSource {
    pub path: PathBuf,
    pub info: GeoTiffInfo,
    pub reference: SourceReference,
}

impl PreparedSource {
    /// Read the source header and resolve its reference frame. Touches no
    /// output location, so a source that cannot be reprojected is rejected
    /// before anything is created.
    pub fn prepare(path: &Path, registry: &CrsRegistry) -> GeomosaicResult<Self> {
        let info = read_info(path, registry).map_err(|e| reprojection(path, e))?;
        let reference = SourceReference::resolve(&info.georef, registry).map_err(|e| reprojection(path, e))?;
        debug!(
            path = %path.display(),
            width = info.georef.width,
            height = info.georef.height,
            bands = info.bands,
            from_gcps = reference.from_gcps,
            epsg = ?reference.crs.epsg,
            "Source prepared for reprojection"
        );
        Ok(Self {
            path: path.to_path_buf(),
            info,
            reference,
        })
    }

    /// Decode, warp to EPSG:3857 and write the intermediate to `destination`.
    pub fn reproject(
        &self,
        warper: &dyn Warper,
        resampling: Resampling,
        nodata: NodataPolicy,
        registry: &CrsRegistry,
        destination: &Path,
    ) -> GeomosaicResult<ReprojectedRaster> {
        let start = Instant::now();
        let (source, _) = read_geotiff(&self.path, registry).map_err(|e| reprojection(&self.path, e))?;
        // Only the RGBA rendition is kept while warping
        let display = source
            .into_display(nodata.resolve(self.info.nodata))
            .map_err(|e| reprojection(&self.path, e))?;

        let options = WarpOptions {
            resampling,
            nodata: None,
        };
        let warped = warper
            .warp(&display, &self.reference, &options)
            .map_err(|e| reprojection(&self.path, e))?;
        drop(display);

        let tags = GeoTags::from_georeference(&warped.georeference(), registry);
        write_geotiff(destination, &warped.raster, &tags).map_err(|e| reprojection(&self.path, e))?;

        let bounds = warped.bounds();
        let lonlat_bounds = mercator_bbox_to_lonlat(&bounds);
        let suggested_max_zoom = suggested_max_zoom(warped.resolution());
        info!(
            path = %destination.display(),
            width = warped.raster.width,
            height = warped.raster.height,
            resolution_m = warped.resolution(),
            west = lonlat_bounds.min_x,
            south = lonlat_bounds.min_y,
            east = lonlat_bounds.max_x,
            north = lonlat_bounds.max_y,
            suggested_max_zoom = ?suggested_max_zoom,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Intermediate raster written"
        );

        Ok(ReprojectedRaster {
            path: destination.to_path_buf(),
            warped,
            bounds,
            lonlat_bounds,
            suggested_max_zoom,
        })
    }
}

/// Output of the reprojection stage. The pixels stay in memory for tiling;
/// the file at `path` is the cached copy.
#[derive(Debug, Clone)]
pub struct ReprojectedRaster {
    pub path: PathBuf,
    pub warped: WarpedRaster,
    /// Web Mercator extent.
    pub bounds: BoundingBox,
    /// Geographic extent in degrees.
    pub lonlat_bounds: BoundingBox,
    pub suggested_max_zoom: Option<u32>,
}

fn reprojection(path: &Path, err: RasterError) -> GeomosaicError {
    GeomosaicError::Reprojection(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_io::MercatorWarper;
    use test_utils::fixtures;

    #[test]
    fn test_prepare_unreferenced_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::unreferenced_rgb(dir.path(), 4, 4);
        let err = PreparedSource::prepare(&path, &CrsRegistry::builtin()).unwrap_err();
        assert_eq!(err.kind(), "ReprojectionError");
    }

    #[test]
    fn test_prepare_missing_file() {
        let err = PreparedSource::prepare(Path::new("/nonexistent/in.tif"), &CrsRegistry::builtin()).unwrap_err();
        assert_eq!(err.kind(), "ReprojectionError");
    }

    #[test]
    fn test_reproject_writes_intermediate() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CrsRegistry::builtin();
        let path = fixtures::utm_rgb(dir.path(), 20, 20);
        let prepared = PreparedSource::prepare(&path, &registry).unwrap();
        assert!(!prepared.reference.from_gcps);

        let destination = dir.path().join("cache").join("warped.tif");
        let out = prepared
            .reproject(
                &MercatorWarper::default(),
                Resampling::Nearest,
                NodataPolicy::Disabled,
                &registry,
                &destination,
            )
            .unwrap();
        assert!(destination.is_file());
        assert_eq!(out.warped.raster.bands, 4);
        // UTM 33N around 15E, 45N
        assert!(out.lonlat_bounds.min_x > 14.0 && out.lonlat_bounds.max_x < 17.0);
        assert!(out.lonlat_bounds.min_y > 44.0 && out.lonlat_bounds.max_y < 46.0);
        assert!(out.suggested_max_zoom.is_some());

        let info = read_info(&destination, &registry).unwrap();
        assert_eq!(info.bands, 4);
        assert_eq!(info.georef.transform, Some(out.warped.transform));
    }
}
