//! Extract/embed round trips against GeoTIFF fixtures.

use std::fs;

use geo_common::GroundControlPoint;
use georef::{embed, extract, GeoreferenceDocument};
use projection::CrsRegistry;
use raster_io::read_geotiff;
use test_utils::{assert_approx_eq, assert_geotransform_eq, fixtures, GeoTiffFixture};

fn assert_relative_eq(a: f64, b: f64) {
    let tolerance = 1e-9 * a.abs().max(b.abs()).max(1.0);
    assert_approx_eq!(a, b, tolerance);
}

#[test]
fn test_roundtrip_affine() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let source = fixtures::utm_rgb(dir.path(), 32, 16);

    let doc = extract(&source, &registry).unwrap();
    let blank = fixtures::unreferenced_rgb(dir.path(), 32, 16);
    let output = dir.path().join("out").join("embedded.tif");
    let report = embed(&doc, &blank, &output, &registry).unwrap();
    assert!(report.wrote_geometry);
    assert!(report.wrote_srs);
    assert!(report.size_mismatch.is_none());

    let again = extract(&output, &registry).unwrap();
    assert_geotransform_eq!(doc.geotransform.unwrap(), again.geotransform.unwrap(), 1e-9);
    assert_eq!(again.projection_wkt, doc.projection_wkt);
    assert_eq!(again.gcps, doc.gcps);
}

#[test]
fn test_roundtrip_into_copy_of_same_raster() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let source = fixtures::geographic_rgb_1000(dir.path());
    let original_bytes = fs::read(&source).unwrap();

    let doc = extract(&source, &registry).unwrap();
    let output = dir.path().join("copy.tif");
    embed(&doc, &source, &output, &registry).unwrap();

    // The original is never modified
    assert_eq!(fs::read(&source).unwrap(), original_bytes);

    let again = extract(&output, &registry).unwrap();
    assert_eq!(again.geotransform, doc.geotransform);
    assert_eq!(again.projection_wkt, doc.projection_wkt);

    let (before, _) = read_geotiff(&source, &registry).unwrap();
    let (after, _) = read_geotiff(&output, &registry).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_roundtrip_gcps() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let source = dir.path().join("gcps.tif");
    GeoTiffFixture::rgb(100, 100)
        .gcps(&[
            (0.0, 0.0, 10.0, 50.0),
            (100.0, 0.0, 11.0, 50.0),
            (0.0, 100.0, 10.0, 49.0),
            (100.0, 100.0, 11.0, 49.0),
        ])
        .epsg(4326)
        .write(&source)
        .unwrap();

    let doc = extract(&source, &registry).unwrap();
    assert!(doc.geotransform.is_none());
    assert_eq!(doc.gcps.len(), 4);
    assert!(!doc.gcp_projection_wkt.is_empty());

    let output = dir.path().join("gcps_copy.tif");
    embed(&doc, &fixtures::unreferenced_rgb(dir.path(), 100, 100), &output, &registry).unwrap();

    let again = extract(&output, &registry).unwrap();
    assert!(again.geotransform.is_none());
    assert_eq!(again.gcp_projection_wkt, doc.gcp_projection_wkt);
    assert_eq!(again.gcps.len(), doc.gcps.len());
    for (a, b) in doc.gcps.iter().zip(&again.gcps) {
        assert_eq!(a.id, b.id);
        assert_relative_eq(a.pixel, b.pixel);
        assert_relative_eq(a.line, b.line);
        assert_relative_eq(a.x, b.x);
        assert_relative_eq(a.y, b.y);
    }
}

#[test]
fn test_projection_only_document_keeps_transform() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let target = fixtures::utm_rgb(dir.path(), 8, 8);
    let before = extract(&target, &registry).unwrap();

    let doc = GeoreferenceDocument::from_json(
        r#"{
            "format": "geomosaic_georef_v1",
            "raster_size": [8, 8],
            "geotransform": null,
            "projection_wkt": "EPSG:32634",
            "gcps": [],
            "gcp_projection_wkt": ""
        }"#,
    )
    .unwrap();
    let output = dir.path().join("reprojected_label.tif");
    let report = embed(&doc, &target, &output, &registry).unwrap();
    assert!(!report.wrote_geometry);
    assert!(report.wrote_srs);

    let after = extract(&output, &registry).unwrap();
    assert_eq!(after.geotransform, before.geotransform);
    assert_eq!(after.projection_wkt, "EPSG:32634");
    assert_ne!(after.projection_wkt, before.projection_wkt);
}

#[test]
fn test_transform_only_document_keeps_projection() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let target = fixtures::utm_rgb(dir.path(), 8, 8);
    let before = extract(&target, &registry).unwrap();

    let mut doc = before.clone();
    doc.geotransform = Some([600_000.0, 50.0, 0.0, 4_000_000.0, 0.0, -50.0]);
    doc.projection_wkt.clear();
    let output = dir.path().join("moved.tif");
    let report = embed(&doc, &target, &output, &registry).unwrap();
    assert!(report.wrote_geometry);
    assert!(!report.wrote_srs);

    let after = extract(&output, &registry).unwrap();
    assert_eq!(after.geotransform, doc.geotransform);
    assert_eq!(after.projection_wkt, before.projection_wkt);
}

#[test]
fn test_gcp_only_document_keeps_transform() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let target = fixtures::utm_rgb(dir.path(), 8, 8);
    let before = extract(&target, &registry).unwrap();

    let mut doc = before.clone();
    doc.geotransform = None;
    doc.gcps = vec![
        GroundControlPoint::new("1", 0.0, 0.0, 500_000.0, 5_000_000.0),
        GroundControlPoint::new("2", 8.0, 0.0, 500_800.0, 5_000_000.0),
        GroundControlPoint::new("3", 0.0, 8.0, 500_000.0, 4_999_200.0),
    ];
    let output = dir.path().join("with_gcps.tif");
    let report = embed(&doc, &target, &output, &registry).unwrap();
    assert!(report.wrote_geometry);

    let after = extract(&output, &registry).unwrap();
    assert_geotransform_eq!(before.geotransform.unwrap(), after.geotransform.unwrap(), 1e-9);
    assert_eq!(after.gcps.len(), 3);
    assert_relative_eq(after.gcps[1].x, 500_800.0);
    assert_relative_eq(after.gcps[2].y, 4_999_200.0);
}

#[test]
fn test_transform_only_document_keeps_gcps() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let target = dir.path().join("gcps.tif");
    GeoTiffFixture::rgb(10, 10)
        .gcps(&[(0.0, 0.0, 10.0, 50.0), (10.0, 0.0, 11.0, 50.0), (0.0, 10.0, 10.0, 49.0)])
        .epsg(4326)
        .write(&target)
        .unwrap();
    let before = extract(&target, &registry).unwrap();
    assert!(before.geotransform.is_none());

    let mut doc = before.clone();
    doc.gcps.clear();
    doc.geotransform = Some([10.0, 0.1, 0.0, 50.0, 0.0, -0.1]);
    let output = dir.path().join("with_transform.tif");
    embed(&doc, &target, &output, &registry).unwrap();

    let after = extract(&output, &registry).unwrap();
    assert_geotransform_eq!(after.geotransform.unwrap(), [10.0, 0.1, 0.0, 50.0, 0.0, -0.1], 1e-9);
    assert_eq!(after.gcps.len(), before.gcps.len());
    for (a, b) in before.gcps.iter().zip(&after.gcps) {
        assert_relative_eq(a.pixel, b.pixel);
        assert_relative_eq(a.line, b.line);
        assert_relative_eq(a.x, b.x);
        assert_relative_eq(a.y, b.y);
    }
}

#[test]
fn test_size_mismatch_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let mut doc = extract(&fixtures::utm_rgb(dir.path(), 8, 8), &registry).unwrap();
    doc.raster_size = vec![16, 16];
    doc.gcps.push(GroundControlPoint::new("extra", 1.0, 1.0, 500_100.0, 4_999_900.0));

    let target = fixtures::unreferenced_rgb(dir.path(), 8, 8);
    let report = embed(&doc, &target, &dir.path().join("mismatch.tif"), &registry).unwrap();
    assert_eq!(report.size_mismatch, Some(((16, 16), (8, 8))));
}

#[test]
fn test_embed_missing_target() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let doc = extract(&fixtures::utm_rgb(dir.path(), 2, 2), &registry).unwrap();
    let output = dir.path().join("never.tif");
    let err = embed(&doc, &dir.path().join("missing.tif"), &output, &registry).unwrap_err();
    assert_eq!(err.kind(), "GeoreferenceIOError");
    assert!(!output.exists());
}

#[test]
fn test_embed_rejects_bad_document_before_copying() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CrsRegistry::builtin();
    let target = fixtures::utm_rgb(dir.path(), 2, 2);
    let mut doc = extract(&target, &registry).unwrap();
    doc.format = "geomosaic_georef_v0".to_string();

    let output = dir.path().join("never.tif");
    let err = embed(&doc, &target, &output, &registry).unwrap_err();
    assert_eq!(err.kind(), "GeoreferenceFormatError");
    assert!(!output.exists());
}
