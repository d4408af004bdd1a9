//! Read a raster's georeferencing into a document.

use std::path::Path;

use geo_common::{GeomosaicError, GeomosaicResult};
use projection::CrsRegistry;
use raster_io::read_info;
use tracing::info;

use crate::GeoreferenceDocument;

/// Extract the affine transform, spatial reference, GCPs and GCP spatial
/// reference of `path`. Each part is independently optional.
pub fn extract(path: &Path, registry: &CrsRegistry) -> GeomosaicResult<GeoreferenceDocument> {
    let info = read_info(path, registry).map_err(|e| {
        GeomosaicError::GeoreferenceIo(format!("cannot read {}: {}", path.display(), e))
    })?;

    let source_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let doc = GeoreferenceDocument::from_georeference(&info.georef, source_file);

    info!(
        path = %path.display(),
        width = info.georef.width,
        height = info.georef.height,
        has_geotransform = doc.geotransform.is_some(),
        gcps = doc.gcps.len(),
        has_projection = !doc.projection_wkt.is_empty(),
        "Extracted georeference"
    );
    Ok(doc)
}
