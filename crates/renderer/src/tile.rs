//! Tile rendering: resample a source pixel window into a square RGBA tile.

use geo_common::{PixelWindow, Resampling};

use crate::RgbaView;

/// Render a `size` x `size` RGBA tile from `window` of `source`.
///
/// Output pixel `(i, j)` samples the source at the window position of its
/// center, with the kernel widened to the pixel's source footprint when the
/// window is larger than the tile. Pixels whose sample point falls outside the source, or on a
/// transparent source pixel, are fully transparent.
pub fn render_tile(source: &RgbaView<'_>, window: &PixelWindow, size: usize, method: Resampling) -> Vec<u8> {
    let mut out = vec![0u8; size * size * 4];
    if !window.overlaps(source.width() as u32, source.height() as u32) {
        return out;
    }

    let step_x = window.width / size as f64;
    let step_y = window.height / size as f64;

    for (j, row) in out.chunks_exact_mut(size * 4).enumerate() {
        let py = window.y_off + (j as f64 + 0.5) * step_y;
        for (i, px) in row.chunks_exact_mut(4).enumerate() {
            let sx = window.x_off + (i as f64 + 0.5) * step_x;
            px.copy_from_slice(&source.sample_scaled(sx, py, step_x, step_y, method));
        }
    }
    out
}

/// True when every pixel has zero alpha.
pub fn is_fully_transparent(pixels: &[u8]) -> bool {
    pixels.chunks_exact(4).all(|px| px[3] == 0)
}
