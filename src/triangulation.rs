use nalgebra as na;

/// Fewer registered views than this cannot be triangulated.
pub const MIN_VIEWS: usize = 2;

/// Linear triangulation (DLT) of one point seen by several cameras.
///
/// Each view contributes the rows `x * P[2] - P[0]` and `y * P[2] - P[1]`.
/// The homogeneous point is the right singular vector of the smallest
/// singular value. Returns `None` when the point is unresolvable: fewer than
/// two views, a failed decomposition or a point at infinity.
pub fn triangulate_dlt(views: &[(na::Matrix3x4<f64>, na::Vector2<f64>)]) -> Option<na::Point3<f64>> {
    if views.len() < MIN_VIEWS {
        return None;
    }
    let mut a = na::DMatrix::<f64>::zeros(2 * views.len(), 4);
    for (i, (p, pixel)) in views.iter().enumerate() {
        a.row_mut(2 * i)
            .copy_from(&(p.row(2) * pixel.x - p.row(0)));
        a.row_mut(2 * i + 1)
            .copy_from(&(p.row(2) * pixel.y - p.row(1)));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd.singular_values.imin();
    let x_h = v_t.row(smallest);

    let w = x_h[3];
    if !w.is_finite() || w.abs() <= f64::EPSILON {
        return None;
    }
    let point = na::Point3::new(x_h[0] / w, x_h[1] / w, x_h[2] / w);
    point.coords.iter().all(|v| v.is_finite()).then_some(point)
}

/// Pixel distance between the projection of `point` and the observation.
///
/// A point on the camera plane (zero depth) has infinite error.
pub fn reprojection_error(
    projection: &na::Matrix3x4<f64>,
    point: &na::Point3<f64>,
    observed: &na::Vector2<f64>,
) -> f64 {
    let h = projection * point.to_homogeneous();
    if h.z == 0.0 || !h.z.is_finite() {
        return f64::INFINITY;
    }
    let projected = na::Vector2::new(h.x / h.z, h.y / h.z);
    let err = (projected - observed).norm();
    if err.is_nan() { f64::INFINITY } else { err }
}
