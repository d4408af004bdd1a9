//! Command-line behaviour: outputs and exit codes.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use test_utils::fixtures;

fn geomosaic() -> Command {
    let mut cmd = Command::cargo_bin("geomosaic").unwrap();
    cmd.env_remove("GEOMOSAIC_DATA_DIR")
        .env_remove("PROJ_DATA")
        .env_remove("PROJ_LIB")
        .env_remove("GEOMOSAIC_MAX_PIXELS")
        .env("GEOMOSAIC_LOG_LEVEL", "warn");
    cmd
}

#[test]
fn test_tile_command() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::utm_rgb(dir.path(), 32, 32);
    let output = dir.path().join("tiles");

    geomosaic()
        .args(["tile", "--min-zoom", "9", "--max-zoom", "10"])
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Preview:"));

    assert!(output.join("index.html").is_file());
    assert!(output.join("9").is_dir());
    assert!(!output.join("_cache").exists());
}

#[test]
fn test_tile_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::utm_rgb(dir.path(), 16, 16);
    let output = dir.path().join("tiles");

    let assert = geomosaic()
        .args(["tile", "--min-zoom", "10", "--max-zoom", "10", "--keep-intermediate", "--json"])
        .arg(&input)
        .arg(&output)
        .assert()
        .success();
    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["min_zoom"], 10);
    assert!(report["tiles_written"].as_u64().unwrap() >= 1);
    assert!(report["intermediate"].as_str().unwrap().ends_with("warped_3857.tif"));
}

#[test]
fn test_unreferenced_input_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::unreferenced_rgb(dir.path(), 8, 8);
    let output = dir.path().join("tiles");

    geomosaic()
        .arg("tile")
        .arg(&input)
        .arg(&output)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("ReprojectionError"));
    assert!(!output.exists());
}

#[test]
fn test_bad_zoom_range_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::utm_rgb(dir.path(), 8, 8);

    geomosaic()
        .args(["tile", "--min-zoom", "6", "--max-zoom", "2"])
        .arg(&input)
        .arg(dir.path().join("tiles"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("InputValidationError"));
}

#[test]
fn test_max_pixels_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::utm_rgb(dir.path(), 8, 8);
    let output = dir.path().join("tiles");

    geomosaic()
        .args(["tile", "--max-pixels", "10"])
        .arg(&input)
        .arg(&output)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("above the limit"));
    assert!(!output.exists());
}

#[test]
fn test_missing_data_dir_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    geomosaic()
        .arg("--data-dir")
        .arg(dir.path().join("nowhere"))
        .args(["georef", "show", "doc.json"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("ConfigurationError"));
}

#[test]
fn test_georef_extract_embed_show() {
    let dir = tempfile::tempdir().unwrap();
    let source = fixtures::utm_rgb(dir.path(), 8, 8);
    let target = fixtures::unreferenced_rgb(dir.path(), 8, 8);
    let doc = dir.path().join("doc.json");
    let output = dir.path().join("out").join("copy.tif");

    geomosaic()
        .args(["georef", "extract"])
        .arg(&source)
        .arg("-o")
        .arg(&doc)
        .assert()
        .success();
    let json = fs::read_to_string(&doc).unwrap();
    assert!(json.contains("\"format\": \"geomosaic_georef_v1\""));

    geomosaic()
        .args(["georef", "embed"])
        .arg(&doc)
        .arg(&target)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("geometry: yes"));
    assert!(output.is_file());

    geomosaic()
        .args(["georef", "extract"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("500000"));

    geomosaic()
        .args(["georef", "show"])
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains("Raster size:    8 x 8"));
}

#[test]
fn test_malformed_document_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("bad.json");
    fs::write(&doc, r#"{"format": "something_else", "raster_size": [1, 1]}"#).unwrap();

    geomosaic()
        .args(["georef", "show"])
        .arg(&doc)
        .assert()
        .code(6)
        .stderr(predicate::str::contains("GeoreferenceFormatError"));
}
