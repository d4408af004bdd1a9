//! Synthetic pixel generators.
//!
//! Patterns are predictable so tests can check where source pixels end up
//! after reprojection and tiling.

/// Interleaved RGB gradient: red follows the column, green the row, blue is
/// constant.
///
/// # Example
///
/// ```
/// use test_utils::rgb_gradient;
///
/// let pixels = rgb_gradient(4, 2);
/// assert_eq!(pixels.len(), 4 * 2 * 3);
/// assert_eq!(&pixels[0..3], &[0, 0, 128]);
/// ```
pub fn rgb_gradient(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        for col in 0..width {
            data.push(scale(col, width));
            data.push(scale(row, height));
            data.push(128);
        }
    }
    data
}

fn scale(i: usize, n: usize) -> u8 {
    if n <= 1 {
        0
    } else {
        (i * 255 / (n - 1)) as u8
    }
}

/// Every sample set to `value`.
pub fn solid(width: usize, height: usize, bands: usize, value: u8) -> Vec<u8> {
    vec![value; width * height * bands]
}

/// Checkerboard of `cell`-sized squares alternating between `a` and `b` in
/// every band.
pub fn checkerboard(width: usize, height: usize, bands: usize, cell: usize, a: u8, b: u8) -> Vec<u8> {
    let cell = cell.max(1);
    let mut data = Vec::with_capacity(width * height * bands);
    for row in 0..height {
        for col in 0..width {
            let v = if (row / cell + col / cell) % 2 == 0 { a } else { b };
            data.extend(std::iter::repeat(v).take(bands));
        }
    }
    data
}

/// Single-band float grid where each value is `col * 1000 + row`.
///
/// ```
/// use test_utils::value_grid;
///
/// let grid = value_grid(10, 5);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn value_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}
