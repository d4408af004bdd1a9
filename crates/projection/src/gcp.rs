//! First-order polynomial (affine) fit to ground control points.

use geo_common::{AffineTransform, GroundControlPoint};
use nalgebra::{DMatrix, DVector};

use crate::ProjectionError;

/// Singular values below this are treated as zero when checking rank.
const RANK_EPSILON: f64 = 1e-10;

/// Least-squares affine transform mapping GCP pixel/line to GCP x/y.
///
/// Requires at least three GCPs that are not collinear in pixel space.
pub fn fit_affine(gcps: &[GroundControlPoint]) -> Result<AffineTransform, ProjectionError> {
    if gcps.len() < 3 {
        return Err(ProjectionError::InsufficientGcps(format!(
            "need at least 3 ground control points, got {}",
            gcps.len()
        )));
    }

    // Normalize pixel coordinates around their centroid for conditioning.
    let n = gcps.len() as f64;
    let cp = gcps.iter().map(|g| g.pixel).sum::<f64>() / n;
    let cl = gcps.iter().map(|g| g.line).sum::<f64>() / n;

    let a = DMatrix::from_fn(gcps.len(), 3, |r, c| match c {
        0 => 1.0,
        1 => gcps[r].pixel - cp,
        _ => gcps[r].line - cl,
    });
    let bx = DVector::from_iterator(gcps.len(), gcps.iter().map(|g| g.x));
    let by = DVector::from_iterator(gcps.len(), gcps.iter().map(|g| g.y));

    let svd = a.svd(true, true);
    if svd.rank(RANK_EPSILON) < 3 {
        return Err(ProjectionError::InsufficientGcps(
            "ground control points are collinear".to_string(),
        ));
    }

    let sx = svd
        .solve(&bx, RANK_EPSILON)
        .map_err(|e| ProjectionError::InsufficientGcps(e.to_string()))?;
    let sy = svd
        .solve(&by, RANK_EPSILON)
        .map_err(|e| ProjectionError::InsufficientGcps(e.to_string()))?;

    // Undo the centroid shift: x = sx0 + sx1*(p - cp) + sx2*(l - cl)
    Ok(AffineTransform {
        origin_x: sx[0] - sx[1] * cp - sx[2] * cl,
        pixel_width: sx[1],
        row_rotation: sx[2],
        origin_y: sy[0] - sy[1] * cp - sy[2] * cl,
        column_rotation: sy[1],
        pixel_height: sy[2],
    })
}
