//! Write a document's georeferencing into a copy of a raster.

use std::fs;
use std::path::{Path, PathBuf};

use geo_common::{GeomosaicError, GeomosaicResult, Georeference, SpatialReference};
use projection::CrsRegistry;
use raster_io::geotags::{GEOMETRY_TAGS, GEO_KEY_DIRECTORY, GT_RASTER_TYPE, SRS_TAGS};
use raster_io::patch::rewrite_tags;
use raster_io::{read_info, GeoTags, TagValue};
use tracing::{info, warn};

use crate::GeoreferenceDocument;

/// What an embed wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedReport {
    pub output: PathBuf,
    pub wrote_geometry: bool,
    pub wrote_srs: bool,
    /// Set when the document's raster size differs from the target's.
    pub size_mismatch: Option<((u32, u32), (u32, u32))>,
}

/// Copy `target` byte-for-byte to `output`, then write the document's
/// transform, spatial reference and GCPs into the copy. Parts absent from the
/// document are left as they were in the copy. The target is never modified.
pub fn embed(
    doc: &GeoreferenceDocument,
    target: &Path,
    output: &Path,
    registry: &CrsRegistry,
) -> GeomosaicResult<EmbedReport> {
    let georef = doc.to_georeference()?;

    if !target.is_file() {
        return Err(GeomosaicError::GeoreferenceIo(format!(
            "target raster not found: {}",
            target.display()
        )));
    }
    if same_file(target, output) {
        return Err(GeomosaicError::GeoreferenceIo(format!(
            "output {} would overwrite the target raster",
            output.display()
        )));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            GeomosaicError::GeoreferenceIo(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    fs::copy(target, output).map_err(|e| {
        GeomosaicError::GeoreferenceIo(format!(
            "cannot copy {} to {}: {}",
            target.display(),
            output.display(),
            e
        ))
    })?;

    let existing = read_info(output, registry).map_err(|e| {
        GeomosaicError::GeoreferenceIo(format!("cannot open {}: {}", output.display(), e))
    })?;
    let target_size = (existing.georef.width, existing.georef.height);
    let doc_size = (georef.width, georef.height);
    let size_mismatch = (target_size != doc_size).then_some((doc_size, target_size));
    if size_mismatch.is_some() {
        warn!(
            document_width = doc_size.0,
            document_height = doc_size.1,
            raster_width = target_size.0,
            raster_height = target_size.1,
            "Document raster size differs from target, embedding anyway"
        );
    }

    let wrote_geometry = georef.has_reference();
    let srs = embedded_srs(&georef.projection, &georef.gcp_projection, georef.transform.is_none() && !georef.gcps.is_empty());
    let wrote_srs = !srs.is_empty();

    let mut remove = Vec::new();
    let mut set = Vec::new();
    if wrote_geometry {
        remove.extend_from_slice(&GEOMETRY_TAGS);
        let geometry = merged_geometry(&georef, &existing.georef);
        set.extend(GeoTags::default().with_geometry(&geometry).entries());
    }
    if wrote_srs {
        remove.extend_from_slice(&SRS_TAGS);
        set.extend(GeoTags::default().with_srs(srs, registry).entries());
    } else if wrote_geometry {
        // Fresh geometry is written as PixelIsArea; keep the rest of the keys
        if let Some(mut keys) = existing.tags.key_directory() {
            keys.set_short(GT_RASTER_TYPE, 1);
            set.push((GEO_KEY_DIRECTORY, TagValue::Shorts(keys.to_vec())));
        }
    }

    if set.is_empty() && remove.is_empty() {
        info!(output = %output.display(), "Document carries no georeferencing, copy left unchanged");
    } else {
        rewrite_tags(output, &remove, &set).map_err(|e| {
            GeomosaicError::GeoreferenceIo(format!("cannot update {}: {}", output.display(), e))
        })?;
    }

    info!(
        target = %target.display(),
        output = %output.display(),
        geometry = wrote_geometry,
        srs = wrote_srs,
        gcps = georef.gcps.len(),
        "Embedded georeference"
    );
    Ok(EmbedReport {
        output: output.to_path_buf(),
        wrote_geometry,
        wrote_srs,
        size_mismatch,
    })
}

/// The document's geometry, with the copy's transform or GCPs kept where the
/// document has none. Both live in the same geometry tags, so rewriting one
/// means writing the other back.
fn merged_geometry(doc: &Georeference, existing: &Georeference) -> Georeference {
    let mut merged = doc.clone();
    if merged.transform.is_none() {
        merged.transform = existing.transform;
    }
    if merged.gcps.is_empty() {
        merged.gcps = existing.gcps.clone();
    }
    merged
}

/// The one spatial reference a GeoTIFF can hold: the GCP one for a GCP-only
/// document, otherwise the primary one, each falling back to the other.
fn embedded_srs<'a>(
    projection: &'a SpatialReference,
    gcp_projection: &'a SpatialReference,
    gcp_only: bool,
) -> &'a SpatialReference {
    let (first, second) = if gcp_only {
        (gcp_projection, projection)
    } else {
        (projection, gcp_projection)
    };
    if first.is_empty() {
        second
    } else {
        first
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
