//! Alpha-aware sampling of RGBA8 rasters.
//!
//! Validity of an output pixel is decided by the source pixel under the sample
//! point: if it lies outside the raster or is transparent, the output is fully
//! transparent. Otherwise the colour is interpolated from the valid neighbours
//! only (weights renormalized), and alpha is fully opaque. When downsampling,
//! the bilinear and cubic kernels are widened to cover the source footprint
//! of the output pixel.

use geo_common::Resampling;

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Widest kernel stretch used when downsampling, in source pixels per output
/// pixel. Larger reductions are only partly prefiltered.
pub const MAX_FILTER_SCALE: f64 = 4.0;

/// Borrowed RGBA8 raster, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, Copy)]
pub struct RgbaView<'a> {
    pixels: &'a [u8],
    width: usize,
    height: usize,
}

impl<'a> RgbaView<'a> {
    /// Returns `None` when `pixels` is not exactly `width * height * 4` bytes.
    pub fn new(pixels: &'a [u8], width: usize, height: usize) -> Option<Self> {
        if pixels.len() != width * height * 4 {
            return None;
        }
        Some(Self {
            pixels,
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn texel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Texel at signed coordinates, `None` if outside or transparent.
    #[inline]
    fn valid_texel(&self, x: i64, y: i64) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        let t = self.texel(x as usize, y as usize);
        (t[3] > 0).then_some(t)
    }

    /// Sample at continuous pixel coordinates, where `(0, 0)` is the top-left
    /// corner of the first pixel and `(0.5, 0.5)` its center.
    pub fn sample(&self, px: f64, py: f64, method: Resampling) -> [u8; 4] {
        self.sample_scaled(px, py, 1.0, 1.0, method)
    }

    /// Like [`sample`](Self::sample), with the kernel widened by the source
    /// pixels covered per output pixel on each axis. Scales below 1 are treated
    /// as 1 and scales above [`MAX_FILTER_SCALE`] are capped.
    pub fn sample_scaled(&self, px: f64, py: f64, scale_x: f64, scale_y: f64, method: Resampling) -> [u8; 4] {
        if !px.is_finite() || !py.is_finite() {
            return TRANSPARENT;
        }
        let nearest = match self.valid_texel(px.floor() as i64, py.floor() as i64) {
            Some(t) => t,
            None => return TRANSPARENT,
        };

        let scale_x = filter_scale(scale_x);
        let scale_y = filter_scale(scale_y);
        let rgb = match method {
            Resampling::Nearest => None,
            Resampling::Bilinear => self.interpolate(px, py, 1.0, scale_x, scale_y, bilinear_weight),
            Resampling::Cubic => self.interpolate(px, py, 2.0, scale_x, scale_y, cubic_weight),
        };
        match rgb {
            Some([r, g, b]) => [r, g, b, 255],
            None => [nearest[0], nearest[1], nearest[2], 255],
        }
    }

    /// Separable kernel interpolation. `support` is the kernel radius in
    /// output pixels, stretched by `scale_x`/`scale_y` in source pixels.
    fn interpolate(
        &self,
        px: f64,
        py: f64,
        support: f64,
        scale_x: f64,
        scale_y: f64,
        kernel: fn(f64) -> f64,
    ) -> Option<[u8; 3]> {
        let cx = px - 0.5;
        let cy = py - 0.5;
        let rx = support * scale_x;
        let ry = support * scale_y;
        let (x0, x1) = ((cx - rx).ceil() as i64, (cx + rx).floor() as i64);
        let (y0, y1) = ((cy - ry).ceil() as i64, (cy + ry).floor() as i64);

        let mut acc = [0.0f64; 3];
        let mut weight_sum = 0.0;
        for y in y0..=y1 {
            let wy = kernel((cy - y as f64) / scale_y);
            if wy == 0.0 {
                continue;
            }
            for x in x0..=x1 {
                let w = kernel((cx - x as f64) / scale_x) * wy;
                if w == 0.0 {
                    continue;
                }
                if let Some(t) = self.valid_texel(x, y) {
                    acc[0] += t[0] as f64 * w;
                    acc[1] += t[1] as f64 * w;
                    acc[2] += t[2] as f64 * w;
                    weight_sum += w;
                }
            }
        }

        if weight_sum.abs() < 1e-12 {
            return None;
        }
        Some([
            to_byte(acc[0] / weight_sum),
            to_byte(acc[1] / weight_sum),
            to_byte(acc[2] / weight_sum),
        ])
    }
}

#[inline]
fn filter_scale(scale: f64) -> f64 {
    if scale.is_finite() {
        scale.clamp(1.0, MAX_FILTER_SCALE)
    } else {
        1.0
    }
}

#[inline]
fn to_byte(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[inline]
fn bilinear_weight(d: f64) -> f64 {
    let d = d.abs();
    if d < 1.0 {
        1.0 - d
    } else {
        0.0
    }
}

/// Catmull-Rom cubic convolution (a = -0.5).
#[inline]
fn cubic_weight(d: f64) -> f64 {
    const A: f64 = -0.5;
    let d = d.abs();
    if d <= 1.0 {
        ((A + 2.0) * d - (A + 3.0)) * d * d + 1.0
    } else if d < 2.0 {
        ((A * d - 5.0 * A) * d + 8.0 * A) * d - 4.0 * A
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Vec<u8> {
        // 2x2: black, white / white, transparent
        vec![
            0, 0, 0, 255, 255, 255, 255, 255, //
            255, 255, 255, 255, 0, 0, 0, 0,
        ]
    }

    #[test]
    fn test_view_size_check() {
        assert!(RgbaView::new(&[0u8; 15], 2, 2).is_none());
        assert!(RgbaView::new(&[0u8; 16], 2, 2).is_some());
    }

    #[test]
    fn test_nearest() {
        let px = checker();
        let view = RgbaView::new(&px, 2, 2).unwrap();
        assert_eq!(view.sample(0.5, 0.5, Resampling::Nearest), [0, 0, 0, 255]);
        assert_eq!(view.sample(1.9, 0.1, Resampling::Nearest), [255, 255, 255, 255]);
        assert_eq!(view.sample(1.5, 1.5, Resampling::Nearest), TRANSPARENT);
        assert_eq!(view.sample(-0.1, 0.5, Resampling::Nearest), TRANSPARENT);
        assert_eq!(view.sample(2.0, 0.5, Resampling::Nearest), TRANSPARENT);
    }

    #[test]
    fn test_bilinear_skips_transparent_neighbours() {
        let px = checker();
        let view = RgbaView::new(&px, 2, 2).unwrap();
        // Near the center: black, white, white valid; transparent ignored
        let s = view.sample(0.9, 0.9, Resampling::Bilinear);
        assert_eq!(s[3], 255);
        assert_eq!(s[0], 146);
        // Directly over the transparent pixel stays transparent
        assert_eq!(view.sample(1.1, 1.1, Resampling::Bilinear), TRANSPARENT);
    }

    #[test]
    fn test_pixel_center_is_exact() {
        let px = checker();
        let view = RgbaView::new(&px, 2, 2).unwrap();
        assert_eq!(view.sample(0.5, 0.5, Resampling::Bilinear), [0, 0, 0, 255]);
        assert_eq!(view.sample(1.5, 0.5, Resampling::Cubic), [255, 255, 255, 255]);
    }

    #[test]
    fn test_scaled_bilinear_averages_footprint() {
        // Columns 1 and 2 of every 4 are white: a point sample between them
        // sees only white, the footprint is half white
        let (w, h) = (32usize, 1usize);
        let px: Vec<u8> = (0..w)
            .flat_map(|c| if c % 4 == 1 || c % 4 == 2 { [255, 255, 255, 255] } else { [0, 0, 0, 255] })
            .collect();
        let view = RgbaView::new(&px, w, h).unwrap();
        assert_eq!(view.sample(10.0, 0.5, Resampling::Bilinear)[0], 255);
        assert_eq!(view.sample_scaled(10.0, 0.5, 4.0, 1.0, Resampling::Bilinear)[0], 128);
        // Unit scale matches the point sample
        assert_eq!(
            view.sample_scaled(10.0, 0.5, 0.25, 1.0, Resampling::Bilinear),
            view.sample(10.0, 0.5, Resampling::Bilinear)
        );
    }

    #[test]
    fn test_cubic_weights_partition_unity() {
        for &f in &[0.0, 0.25, 0.5, 0.9] {
            let sum: f64 = (-1..=2).map(|i| cubic_weight(f - i as f64)).sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }
}
