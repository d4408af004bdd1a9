//! Test support for the geomosaic crates.
//!
//! - `fixtures`: GeoTIFFs written straight through the `tiff` encoder, so
//!   readers are tested against files they did not produce
//! - `generators`: synthetic pixel buffers
//! - float assertions for coordinates and geotransforms
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Assert `|left - right| <= epsilon`, comparing as `f64`.
///
/// ```ignore
/// assert_approx_eq!(lon, -90.0, 1e-9);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `{} ≈ {}`\n  left: {:?}\n right: {:?}\n  diff: {:?} > {:?}",
                stringify!($left),
                stringify!($right),
                left,
                right,
                diff,
                epsilon
            );
        }
    }};
}

/// Assert two `(x, y)` pairs agree on both axes.
#[macro_export]
macro_rules! assert_coords_approx_eq {
    (($x1:expr, $y1:expr), ($x2:expr, $y2:expr), $epsilon:expr) => {{
        $crate::assert_approx_eq!($x1, $x2, $epsilon);
        $crate::assert_approx_eq!($y1, $y2, $epsilon);
    }};
}

/// Assert two GDAL-ordered geotransforms agree coefficient by coefficient,
/// with a tolerance relative to the larger magnitude (at least 1).
#[macro_export]
macro_rules! assert_geotransform_eq {
    ($left:expr, $right:expr, $relative:expr) => {{
        let left: [f64; 6] = $left;
        let right: [f64; 6] = $right;
        for i in 0..6 {
            let scale = left[i].abs().max(right[i].abs()).max(1.0);
            $crate::assert_approx_eq!(left[i], right[i], $relative * scale);
        }
    }};
}
