//! Spherical (Web) Mercator projection, EPSG:3857.

use std::f64::consts::PI;

use geo_common::BoundingBox;

/// WGS84 semi-major axis used as the sphere radius by EPSG:3857.
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude at which the Web Mercator world becomes square.
pub const MAX_LATITUDE: f64 = 85.05112877980659;

/// Project lon/lat degrees to Web Mercator meters. Latitude is clamped to the
/// valid Web Mercator range.
#[inline]
pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Inverse of [`lonlat_to_mercator`].
#[inline]
pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

/// Convert a Web Mercator bounding box to lon/lat degrees.
pub fn mercator_bbox_to_lonlat(bbox: &BoundingBox) -> BoundingBox {
    let (min_lon, min_lat) = mercator_to_lonlat(bbox.min_x, bbox.min_y);
    let (max_lon, max_lat) = mercator_to_lonlat(bbox.max_x, bbox.max_y);
    BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
}
