//! Tests for CRS registry overrides and source-to-mercator transforms.

use projection::mercator::{lonlat_to_mercator, mercator_bbox_to_lonlat};
use projection::registry::OVERRIDES_FILE_NAME;
use projection::{CrsRegistry, CrsTransformer, ProjectionError};
use std::fs;
use test_utils::{assert_approx_eq, assert_coords_approx_eq};

#[test]
fn test_data_dir_without_overrides_uses_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::from_data_dir(dir.path()).unwrap();
    assert!(registry.overrides_source().is_none());
    assert!(registry.lookup(4326).is_some());
}

#[test]
fn test_overrides_take_precedence() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(OVERRIDES_FILE_NAME),
        "# local definitions\n<4326> +proj=longlat +ellps=WGS84 +towgs84=0,0,0 +no_defs <>\n",
    )
    .unwrap();

    let registry = CrsRegistry::from_data_dir(dir.path()).unwrap();
    assert!(registry.overrides_source().is_some());

    let def = registry.lookup(4326).unwrap();
    assert!(def.proj4.contains("+towgs84=0,0,0"));
    assert!(def.wkt.is_none());

    // Codes not overridden still come from the embedded database
    assert!(registry.lookup(3857).unwrap().wkt.is_some());
    registry.smoke_test().unwrap();
}

#[test]
fn test_malformed_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(OVERRIDES_FILE_NAME), "garbage line\n").unwrap();
    assert!(matches!(
        CrsRegistry::from_data_dir(dir.path()),
        Err(ProjectionError::DefinitionsFile { .. })
    ));
}

#[test]
fn test_utm_to_mercator_matches_lonlat_path() {
    let registry = CrsRegistry::builtin();
    let utm = CrsTransformer::new(&registry.resolve("EPSG:32633").unwrap()).unwrap();

    let (x, y) = utm.from_lonlat(15.0, 52.0).unwrap();
    let (lon, lat) = utm.to_lonlat(x, y).unwrap();
    let (mx, my) = lonlat_to_mercator(lon, lat);
    let (ex, ey) = lonlat_to_mercator(15.0, 52.0);
    assert_coords_approx_eq!((mx, my), (ex, ey), 1e-3);
}

#[test]
fn test_mercator_bbox_to_lonlat() {
    let (min_x, min_y) = lonlat_to_mercator(-100.0, -10.0);
    let (max_x, max_y) = lonlat_to_mercator(-90.0, 0.0);
    let bbox = mercator_bbox_to_lonlat(&geo_common::BoundingBox::new(min_x, min_y, max_x, max_y));
    assert_approx_eq!(bbox.min_x, -100.0, 1e-9);
    assert_approx_eq!(bbox.min_y, -10.0, 1e-9);
    assert_approx_eq!(bbox.max_x, -90.0, 1e-9);
    assert_approx_eq!(bbox.max_y, 0.0, 1e-9);
}
