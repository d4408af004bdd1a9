//! In-memory raster with interleaved samples.

use rayon::prelude::*;

use crate::RasterError;

/// Storage type of the samples as read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

/// Interleaved sample buffer. 8-bit unsigned data stays compact, everything
/// else is widened to `f32`.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded raster: `width * height` pixels of `bands` interleaved samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub bands: usize,
    pub kind: SampleKind,
    pub samples: Samples,
}

impl Raster {
    pub fn new(width: u32, height: u32, bands: usize, kind: SampleKind, samples: Samples) -> Result<Self, RasterError> {
        if width == 0 || height == 0 || bands == 0 {
            return Err(RasterError::InvalidData(format!(
                "raster must have positive size, got {}x{}x{}",
                width, height, bands
            )));
        }
        let expected = width as usize * height as usize * bands;
        if samples.len() != expected {
            return Err(RasterError::InvalidData(format!(
                "expected {} samples for {}x{}x{}, got {}",
                expected,
                width,
                height,
                bands,
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            bands,
            kind,
            samples,
        })
    }

    pub fn from_u8(width: u32, height: u32, bands: usize, data: Vec<u8>) -> Result<Self, RasterError> {
        Self::new(width, height, bands, SampleKind::U8, Samples::U8(data))
    }

    pub fn from_f32(width: u32, height: u32, bands: usize, data: Vec<f32>) -> Result<Self, RasterError> {
        Self::new(width, height, bands, SampleKind::F32, Samples::F32(data))
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Sample value at pixel index `i` (row-major) and `band`.
    #[inline]
    fn value(&self, i: usize, band: usize) -> f64 {
        let idx = i * self.bands + band;
        match &self.samples {
            Samples::U8(v) => v[idx] as f64,
            Samples::F32(v) => v[idx] as f64,
        }
    }

    /// The raw bytes when this is an 8-bit raster.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.samples {
            Samples::U8(v) => Some(v),
            Samples::F32(_) => None,
        }
    }

    /// Convert to display RGBA8 with binary alpha.
    ///
    /// Band mapping: 1 band grey, 2 bands grey + alpha, 3 bands RGB, 4 or more
    /// bands RGB + alpha (band 4). Non-8-bit data is linearly stretched from the
    /// valid min/max to 0..255. A pixel is transparent when its colour bands all
    /// equal `nodata`, when a float sample is NaN, or when its alpha band is 0.
    pub fn to_display_rgba(&self, nodata: Option<f64>) -> Vec<u8> {
        let layout = BandLayout::for_bands(self.bands);
        let stretch = match self.kind {
            SampleKind::U8 => Stretch::identity(),
            _ => self.stretch(&layout, nodata),
        };

        let width = self.width as usize;
        let mut out = vec![0u8; self.pixel_count() * 4];
        out.par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(row, chunk)| {
                for (col, px) in chunk.chunks_exact_mut(4).enumerate() {
                    let i = row * width + col;
                    if !self.is_valid(i, &layout, nodata) {
                        continue;
                    }
                    let r = self.value(i, layout.color[0]);
                    let g = self.value(i, layout.color[1]);
                    let b = self.value(i, layout.color[2]);
                    px.copy_from_slice(&[stretch.apply(r), stretch.apply(g), stretch.apply(b), 255]);
                }
            });
        out
    }

    /// Consume into a display RGBA8 raster. The original samples are released
    /// before returning.
    pub fn into_display(self, nodata: Option<f64>) -> Result<Raster, RasterError> {
        let rgba = self.to_display_rgba(nodata);
        let (width, height) = (self.width, self.height);
        drop(self);
        Raster::from_u8(width, height, 4, rgba)
    }

    #[inline]
    fn is_valid(&self, i: usize, layout: &BandLayout, nodata: Option<f64>) -> bool {
        if let Some(alpha) = layout.alpha {
            if self.value(i, alpha) <= 0.0 {
                return false;
            }
        }
        let mut all_nodata = true;
        for &band in layout.distinct_color() {
            let v = self.value(i, band);
            if v.is_nan() {
                return false;
            }
            match nodata {
                Some(nd) if v == nd => {}
                _ => all_nodata = false,
            }
        }
        !(nodata.is_some() && all_nodata)
    }

    fn stretch(&self, layout: &BandLayout, nodata: Option<f64>) -> Stretch {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for i in 0..self.pixel_count() {
            if !self.is_valid(i, layout, nodata) {
                continue;
            }
            for &band in layout.distinct_color() {
                let v = self.value(i, band);
                if v.is_finite() {
                    min = min.min(v);
                    max = max.max(v);
                }
            }
        }
        if min.is_finite() && max > min {
            Stretch {
                offset: min,
                scale: 255.0 / (max - min),
            }
        } else {
            Stretch { offset: min, scale: 0.0 }
        }
    }
}

struct BandLayout {
    color: [usize; 3],
    alpha: Option<usize>,
}

impl BandLayout {
    fn for_bands(bands: usize) -> Self {
        match bands {
            1 => Self { color: [0, 0, 0], alpha: None },
            2 => Self { color: [0, 0, 0], alpha: Some(1) },
            3 => Self { color: [0, 1, 2], alpha: None },
            _ => Self { color: [0, 1, 2], alpha: Some(3) },
        }
    }

    fn distinct_color(&self) -> &[usize] {
        if self.color[0] == self.color[1] {
            &self.color[..1]
        } else {
            &self.color[..]
        }
    }
}

struct Stretch {
    offset: f64,
    scale: f64,
}

impl Stretch {
    fn identity() -> Self {
        Self { offset: 0.0, scale: 1.0 }
    }

    #[inline]
    fn apply(&self, v: f64) -> u8 {
        ((v - self.offset) * self.scale).round().clamp(0.0, 255.0) as u8
    }
}
