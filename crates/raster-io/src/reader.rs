//! GeoTIFF reading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo_common::Georeference;
use projection::CrsRegistry;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use crate::geotags::GeoTags;
use crate::raster::{Raster, SampleKind, Samples};
use crate::RasterError;

type TiffDecoder = Decoder<BufReader<File>>;

/// TIFF baseline text tags surfaced as metadata, with their GDAL names.
const TEXT_METADATA: [(Tag, &str); 5] = [
    (Tag::ImageDescription, "TIFFTAG_IMAGEDESCRIPTION"),
    (Tag::Software, "TIFFTAG_SOFTWARE"),
    (Tag::DateTime, "TIFFTAG_DATETIME"),
    (Tag::Artist, "TIFFTAG_ARTIST"),
    (Tag::Copyright, "TIFFTAG_COPYRIGHT"),
];

/// Header-level information about a GeoTIFF (no pixel data).
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffInfo {
    pub georef: Georeference,
    pub tags: GeoTags,
    pub bands: usize,
    pub nodata: Option<f64>,
}

/// Read size, band count, georeferencing and nodata without decoding pixels.
pub fn read_info(path: &Path, registry: &CrsRegistry) -> Result<GeoTiffInfo, RasterError> {
    let mut decoder = open(path)?;
    read_info_from(&mut decoder, registry)
}

/// Read the first image of a GeoTIFF together with its header information.
pub fn read_geotiff(path: &Path, registry: &CrsRegistry) -> Result<(Raster, GeoTiffInfo), RasterError> {
    let mut decoder = open(path)?;
    let info = read_info_from(&mut decoder, registry)?;

    let (kind, samples) = match decoder.read_image()? {
        DecodingResult::U8(v) => (SampleKind::U8, Samples::U8(v)),
        DecodingResult::I8(v) => (SampleKind::I8, widen(v)),
        DecodingResult::U16(v) => (SampleKind::U16, widen(v)),
        DecodingResult::I16(v) => (SampleKind::I16, widen(v)),
        DecodingResult::U32(v) => (SampleKind::U32, Samples::F32(v.into_iter().map(|x| x as f32).collect())),
        DecodingResult::I32(v) => (SampleKind::I32, Samples::F32(v.into_iter().map(|x| x as f32).collect())),
        DecodingResult::U64(v) => (SampleKind::U64, Samples::F32(v.into_iter().map(|x| x as f32).collect())),
        DecodingResult::I64(v) => (SampleKind::I64, Samples::F32(v.into_iter().map(|x| x as f32).collect())),
        DecodingResult::F32(v) => (SampleKind::F32, Samples::F32(v)),
        DecodingResult::F64(v) => (SampleKind::F64, Samples::F32(v.into_iter().map(|x| x as f32).collect())),
        DecodingResult::F16(_) => {
            return Err(RasterError::Unsupported("16-bit float samples are not supported".to_string()))
        }
    };

    let raster = Raster::new(info.georef.width, info.georef.height, info.bands, kind, samples)?;
    debug!(
        path = %path.display(),
        width = raster.width,
        height = raster.height,
        bands = raster.bands,
        kind = ?raster.kind,
        "Decoded GeoTIFF"
    );
    Ok((raster, info))
}

fn widen<T: Into<f32>>(v: Vec<T>) -> Samples {
    Samples::F32(v.into_iter().map(Into::into).collect())
}

fn open(path: &Path) -> Result<TiffDecoder, RasterError> {
    let file = File::open(path).map_err(|e| RasterError::io(path, e))?;
    Ok(Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited()))
}

fn read_info_from(decoder: &mut TiffDecoder, registry: &CrsRegistry) -> Result<GeoTiffInfo, RasterError> {
    let (width, height) = decoder.dimensions()?;
    let bands = match decoder.colortype()? {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        other => {
            return Err(RasterError::Unsupported(format!(
                "color type {:?}",
                other
            )))
        }
    };

    let tags = read_geo_tags(decoder);
    let mut georef = tags.to_georeference(width, height, registry);
    for (tag, name) in TEXT_METADATA {
        if let Ok(value) = decoder.get_tag_ascii_string(tag) {
            let value = value.trim_end_matches('\0').to_string();
            if !value.is_empty() {
                georef.metadata.insert(name.to_string(), value);
            }
        }
    }

    Ok(GeoTiffInfo {
        nodata: tags.nodata_value(),
        georef,
        tags,
        bands,
    })
}

fn read_geo_tags(decoder: &mut TiffDecoder) -> GeoTags {
    GeoTags {
        pixel_scale: decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok(),
        tiepoints: decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok(),
        transformation: decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok(),
        geo_keys: decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok(),
        geo_doubles: decoder.get_tag_f64_vec(Tag::GeoDoubleParamsTag).ok(),
        geo_ascii: decoder.get_tag_ascii_string(Tag::GeoAsciiParamsTag).ok(),
        nodata: decoder.get_tag_ascii_string(Tag::GdalNodata).ok(),
    }
}
