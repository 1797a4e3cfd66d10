/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// 4x4 transformation matrix.
pub type Matrix4 = nalgebra::Matrix4<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Builds a 4x4 rotation matrix around a unit axis by an angle (Rodrigues).
#[allow(clippy::many_single_char_names)]
#[must_use]
pub fn rotation_matrix(axis: &Vector3, angle: f64) -> Matrix4 {
    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;
    let (x, y, z) = (axis.x, axis.y, axis.z);

    #[allow(clippy::suspicious_operation_groupings)]
    Matrix4::new(
        t * x * x + c,     t * x * y - s * z, t * x * z + s * y, 0.0,
        t * x * y + s * z, t * y * y + c,     t * y * z - s * x, 0.0,
        t * x * z - s * y, t * y * z + s * x, t * z * z + c,     0.0,
        0.0,               0.0,               0.0,               1.0,
    )
}

/// Rotation about an axis through a point: translate to origin, rotate, translate back.
#[must_use]
pub fn rotation_about(origin: &Point3, axis: &Vector3, angle: f64) -> Matrix4 {
    let t_neg = Matrix4::new_translation(&(-origin.coords));
    let rot = rotation_matrix(axis, angle);
    let t_pos = Matrix4::new_translation(&origin.coords);
    t_pos * rot * t_neg
}

/// Applies a homogeneous transform to a point.
#[must_use]
pub fn transform_point(matrix: &Matrix4, point: &Point3) -> Point3 {
    matrix.transform_point(point)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn rotate_90_around_z_maps_x_to_y() {
        let m = rotation_matrix(&Vector3::z(), FRAC_PI_2);
        let p = transform_point(&m, &Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn rotation_about_offset_axis_fixes_the_origin_point() {
        let origin = Point3::new(2.0, 0.0, 0.0);
        let m = rotation_about(&origin, &Vector3::z(), 1.234);
        let p = transform_point(&m, &origin);
        assert_relative_eq!(p.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
    }
}
