//! GeoTIFF writing (deflate-compressed strips).

use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tiff::encoder::colortype::{Gray32Float, Gray8, RGB8, RGBA8};
use tiff::encoder::{Compression, DeflateLevel, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::debug;

use crate::geotags::{GeoTags, TagValue};
use crate::raster::{Raster, Samples};
use crate::RasterError;

/// Write `raster` as a GeoTIFF carrying `tags`.
///
/// Supported layouts are 8-bit grey, RGB and RGBA, and single-band `f32`.
pub fn write_geotiff(path: &Path, raster: &Raster, tags: &GeoTags) -> Result<(), RasterError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RasterError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| RasterError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut encoder = TiffEncoder::new(&mut writer)?.with_compression(Compression::Deflate(DeflateLevel::Fast));

    let (width, height) = (raster.width, raster.height);
    match (&raster.samples, raster.bands) {
        (Samples::U8(data), 1) => {
            let mut image = encoder.new_image::<Gray8>(width, height)?;
            write_geo_tags(image.encoder(), tags)?;
            image.write_data(data)?;
        }
        (Samples::U8(data), 3) => {
            let mut image = encoder.new_image::<RGB8>(width, height)?;
            write_geo_tags(image.encoder(), tags)?;
            image.write_data(data)?;
        }
        (Samples::U8(data), 4) => {
            let mut image = encoder.new_image::<RGBA8>(width, height)?;
            write_geo_tags(image.encoder(), tags)?;
            image.write_data(data)?;
        }
        (Samples::F32(data), 1) => {
            let mut image = encoder.new_image::<Gray32Float>(width, height)?;
            write_geo_tags(image.encoder(), tags)?;
            image.write_data(data)?;
        }
        (_, bands) => {
            return Err(RasterError::Unsupported(format!(
                "cannot write {:?} raster with {} bands",
                raster.kind, bands
            )))
        }
    }
    writer.flush().map_err(|e| RasterError::io(path, e))?;

    debug!(
        path = %path.display(),
        width,
        height,
        bands = raster.bands,
        "Wrote GeoTIFF"
    );
    Ok(())
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    tags: &GeoTags,
) -> Result<(), RasterError> {
    for (code, value) in tags.entries() {
        let tag = Tag::Unknown(code);
        match value {
            TagValue::Doubles(v) => dir.write_tag(tag, v.as_slice())?,
            TagValue::Shorts(v) => dir.write_tag(tag, v.as_slice())?,
            TagValue::Ascii(v) => dir.write_tag(tag, v.as_str())?,
        }
    }
    Ok(())
}
