//! GeoTIFF fixtures.
//!
//! [`GeoTiffFixture`] writes small GeoTIFFs with hand-specified tags so tests
//! exercise the readers against files they did not produce themselves.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tiff::encoder::colortype::{Gray32Float, Gray8, RGB8, RGBA8};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tiff::TiffResult;

use crate::generators::rgb_gradient;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

/// Well-known fixture extents.
pub mod extents {
    /// Geographic tile: 10 x 10 degrees south-west of (-90, 0).
    pub const GEOGRAPHIC_ORIGIN: (f64, f64) = (-100.0, 0.0);
    /// UTM zone 33N origin used by projected fixtures (EPSG:32633).
    pub const UTM33_ORIGIN: (f64, f64) = (500_000.0, 5_000_000.0);
}

#[derive(Debug, Clone)]
enum Pixels {
    U8 { bands: usize, data: Vec<u8> },
    F32(Vec<f32>),
}

/// Builder for a single-image GeoTIFF.
#[derive(Debug, Clone)]
pub struct GeoTiffFixture {
    width: u32,
    height: u32,
    pixels: Pixels,
    pixel_scale: Option<[f64; 3]>,
    tiepoints: Vec<[f64; 6]>,
    transformation: Option<[f64; 16]>,
    keys: Vec<[u16; 4]>,
    ascii: String,
    nodata: Option<String>,
}

impl GeoTiffFixture {
    /// RGB fixture filled with [`rgb_gradient`].
    pub fn rgb(width: u32, height: u32) -> Self {
        Self::with_u8(width, height, 3, rgb_gradient(width as usize, height as usize))
    }

    /// Raster of 8-bit samples with `bands` of 1, 3 or 4.
    pub fn with_u8(width: u32, height: u32, bands: usize, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width as usize * height as usize * bands);
        Self::new(width, height, Pixels::U8 { bands, data })
    }

    /// Single-band `f32` raster.
    pub fn float32(width: u32, height: u32, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), width as usize * height as usize);
        Self::new(width, height, Pixels::F32(data))
    }

    fn new(width: u32, height: u32, pixels: Pixels) -> Self {
        Self {
            width,
            height,
            pixels,
            pixel_scale: None,
            tiepoints: Vec::new(),
            transformation: None,
            keys: Vec::new(),
            ascii: String::new(),
            nodata: None,
        }
    }

    /// North-up placement via ModelPixelScale + one tiepoint at pixel (0, 0).
    pub fn north_up(mut self, origin_x: f64, origin_y: f64, pixel_size: f64) -> Self {
        self.pixel_scale = Some([pixel_size, pixel_size, 0.0]);
        self.tiepoints = vec![[0.0, 0.0, 0.0, origin_x, origin_y, 0.0]];
        self
    }

    /// Placement via ModelTransformation with GDAL-ordered coefficients.
    pub fn affine(mut self, gt: [f64; 6]) -> Self {
        self.transformation = Some([
            gt[1], gt[2], 0.0, gt[0], gt[4], gt[5], 0.0, gt[3], 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ]);
        self
    }

    /// Ground control points as `(pixel, line, x, y)`.
    pub fn gcps(mut self, points: &[(f64, f64, f64, f64)]) -> Self {
        self.pixel_scale = None;
        self.tiepoints = points.iter().map(|&(p, l, x, y)| [p, l, 0.0, x, y, 0.0]).collect();
        self
    }

    /// EPSG code in the geographic (2048) or projected (3072) key.
    pub fn epsg(mut self, code: u16) -> Self {
        let geographic = matches!(code, 4326 | 4269 | 4258 | 4267 | 4230);
        self.keys.push([1024, 0, 1, if geographic { 2 } else { 1 }]);
        self.keys.push([1025, 0, 1, 1]);
        self.keys.push([if geographic { 2048 } else { 3072 }, 0, 1, code]);
        self
    }

    /// Raster type GeoKey: 1 for PixelIsArea, 2 for PixelIsPoint.
    pub fn raster_type(mut self, value: u16) -> Self {
        self.keys.retain(|k| k[0] != 1025);
        self.keys.push([1025, 0, 1, value]);
        self
    }

    /// GTCitation key carrying arbitrary text.
    pub fn citation(mut self, text: &str) -> Self {
        let offset = self.ascii.len() as u16;
        self.ascii.push_str(text);
        self.ascii.push('|');
        self.keys
            .push([1026, GEO_ASCII_PARAMS, (text.len() + 1) as u16, offset]);
        self
    }

    pub fn nodata(mut self, value: f64) -> Self {
        self.nodata = Some(value.to_string());
        self
    }

    fn key_directory(&self) -> Vec<u16> {
        let mut keys = self.keys.clone();
        keys.sort_by_key(|k| k[0]);
        let mut out = vec![1, 1, 0, keys.len() as u16];
        for k in keys {
            out.extend_from_slice(&k);
        }
        out
    }

    /// Write the fixture to `path`.
    pub fn write(&self, path: &Path) -> TiffResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        let mut encoder = TiffEncoder::new(&mut writer)?;
        let (w, h) = (self.width, self.height);

        macro_rules! write_image {
            ($color:ty, $data:expr) => {{
                let mut image = encoder.new_image::<$color>(w, h)?;
                let dir = image.encoder();
                if let Some(scale) = &self.pixel_scale {
                    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
                }
                if !self.tiepoints.is_empty() {
                    let flat: Vec<f64> = self.tiepoints.iter().flatten().copied().collect();
                    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), flat.as_slice())?;
                }
                if let Some(t) = &self.transformation {
                    dir.write_tag(Tag::Unknown(MODEL_TRANSFORMATION), &t[..])?;
                }
                if !self.keys.is_empty() {
                    let keys = self.key_directory();
                    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), keys.as_slice())?;
                }
                if !self.ascii.is_empty() {
                    dir.write_tag(Tag::Unknown(GEO_ASCII_PARAMS), self.ascii.as_str())?;
                }
                if let Some(nodata) = &self.nodata {
                    dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;
                }
                image.write_data($data)?;
            }};
        }

        match &self.pixels {
            Pixels::U8 { bands: 1, data } => write_image!(Gray8, data),
            Pixels::U8 { bands: 3, data } => write_image!(RGB8, data),
            Pixels::U8 { bands: 4, data } => write_image!(RGBA8, data),
            Pixels::U8 { bands, .. } => panic!("unsupported fixture band count {}", bands),
            Pixels::F32(data) => write_image!(Gray32Float, data),
        }
        Ok(())
    }

    /// Write into `dir` under `name` and return the path.
    pub fn write_in(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        self.write(&path).expect("failed to write GeoTIFF fixture");
        path
    }
}

/// 1000 x 1000 RGB at 0.01 degrees covering lon -100..-90, lat -10..0 (EPSG:4326).
pub fn geographic_rgb_1000(dir: &Path) -> PathBuf {
    let (x, y) = extents::GEOGRAPHIC_ORIGIN;
    GeoTiffFixture::rgb(1000, 1000)
        .north_up(x, y, 0.01)
        .epsg(4326)
        .write_in(dir, "geographic_rgb.tif")
}

/// Small UTM 33N RGB raster at 100 m pixels.
pub fn utm_rgb(dir: &Path, width: u32, height: u32) -> PathBuf {
    let (x, y) = extents::UTM33_ORIGIN;
    GeoTiffFixture::rgb(width, height)
        .north_up(x, y, 100.0)
        .epsg(32633)
        .write_in(dir, "utm_rgb.tif")
}

/// RGB raster with no georeferencing tags at all.
pub fn unreferenced_rgb(dir: &Path, width: u32, height: u32) -> PathBuf {
    GeoTiffFixture::rgb(width, height).write_in(dir, "plain.tif")
}
